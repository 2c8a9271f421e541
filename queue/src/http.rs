use std::io::{ Error, ErrorKind };
use std::time::Duration;
use async_trait::async_trait;
use reqwest::{ Client, StatusCode };
use reqwest::header::{ AUTHORIZATION, CONTENT_TYPE };
use tokio::sync::Mutex;
use domains::errors::PublishError;
use crate::publisher::Publisher;
use log::{ info, debug };


/// A publisher that posts each message to a queue's REST endpoint at
/// `{connection_target}/{queue_name}/messages`.
///
/// The channel is a `reqwest::Client`, built on the first send. A transport
/// failure (refused connection, timeout, 503) throws the client away so
/// the next send connects again instead of reusing a broken channel.
#[derive(Debug)]
pub struct HttpQueue {

	/// The base URL of the broker
	connection_target: String,

	/// The name of the queue messages are posted to
	queue_name: String,

	/// A value for the Authorization header, for example a shared access signature
	token: Option<String>,

	/// How long a single send may take
	timeout: Duration,

	/// The outbound channel. Empty until the first send and after a reset.
	channel: Mutex<Option<Client>>,

}

impl HttpQueue {

	/// Create a new HTTP queue publisher. Nothing is sent until the first message.
	pub fn new(
		connection_target: &str,
		queue_name: &str,
		token: Option<String>,
		timeout: Duration
	) -> Result<HttpQueue, std::io::Error> {

		if !connection_target.starts_with("http://") && !connection_target.starts_with("https://") {
			let error_message = format!("The connection target {} is not an http or https URL.", connection_target);
			return Err(Error::new(ErrorKind::InvalidInput, error_message));
		}

		if queue_name.trim().is_empty() {
			return Err(Error::new(ErrorKind::InvalidInput, "The queue name has no characters in it."));
		}

		info!(target: "queue", "Initialised HTTP queue publisher sending to {} on {}", queue_name, connection_target);

		Ok(HttpQueue {
			connection_target: connection_target.trim_end_matches('/').to_string(),
			queue_name: queue_name.to_string(),
			token,
			timeout,
			channel: Mutex::new(None),
		})

	}

	/// The URL messages are posted to
	pub fn endpoint(&self) -> String {

		format!("{}/{}/messages", self.connection_target, self.queue_name)

	}

	/// Whether the publisher currently holds an open channel
	pub async fn is_connected(&self) -> bool {

		self.channel.lock().await.is_some()

	}

	/// Get the open channel or build a new one
	async fn connect(&self) -> Result<Client, PublishError> {

		let mut channel = self.channel.lock().await;

		if let Some(client) = channel.as_ref() {
			return Ok(client.clone());
		}

		let client = Client::builder()
			.timeout(self.timeout)
			.build()
			.map_err(|e| PublishError::Fatal(format!("could not build a client for {}: {}", self.connection_target, e)))?;

		debug!(target: "queue", "Opened a channel to {}.", self.endpoint());

		*channel = Some(client.clone());
		Ok(client)

	}

	/// Drop the channel so the next send opens a fresh one
	async fn reset(&self) {

		if self.channel.lock().await.take().is_some() {
			debug!(target: "queue", "Dropped the channel to {}.", self.endpoint());
		}

	}

}

#[async_trait]
impl Publisher for HttpQueue {

	fn target(&self) -> &str {

		&self.connection_target

	}

	fn queue_name(&self) -> &str {

		&self.queue_name

	}

	async fn send(&self, message_body: &str) -> Result<(), PublishError> {

		if message_body.trim().is_empty() {
			return Err(PublishError::Fatal("the message body is empty".to_string()));
		}

		let client = self.connect().await?;

		let mut request = client
			.post(self.endpoint())
			.header(CONTENT_TYPE, "application/json")
			.body(message_body.to_owned());

		if let Some(token) = &self.token {
			request = request.header(AUTHORIZATION, token);
		}

		match request.send().await {

			Ok(response) if response.status().is_success() => Ok(()),

			Ok(response) => {

				let status = response.status();
				let body = response.text().await.unwrap_or_default();

				if status == StatusCode::SERVICE_UNAVAILABLE {
					self.reset().await;
				}

				Err(classify_status(status, &body))

			},

			Err(error) => {

				let error = classify_transport(&error);

				if error.is_transient() {
					self.reset().await;
				}

				Err(error)

			},

		}

	}

	async fn close(&self) {

		self.reset().await;

	}

}


/// Decide whether a response status is worth retrying. Timeouts, throttling
/// and server errors are; everything else means the broker refused the
/// message or the queue.
pub fn classify_status(status: StatusCode, body: &str) -> PublishError {

	let message = format!("the queue responded with {}: {}", status, body);

	if status == StatusCode::REQUEST_TIMEOUT
		|| status == StatusCode::TOO_MANY_REQUESTS
		|| status.is_server_error() {

		PublishError::Transient(message)

	}
	else {

		PublishError::Fatal(message)

	}

}

/// Decide whether a failure to reach the queue is worth retrying. Only a
/// request that could not even be built is fatal.
fn classify_transport(error: &reqwest::Error) -> PublishError {

	if error.is_builder() {
		PublishError::Fatal(format!("the request could not be built: {}", error))
	}
	else {
		PublishError::Transient(format!("the queue could not be reached: {}", error))
	}

}

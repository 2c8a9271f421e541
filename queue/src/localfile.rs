use std::path::Path;
use std::io::{ Error, ErrorKind };
use async_trait::async_trait;
use tokio::fs::{ File, OpenOptions };
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use domains::errors::PublishError;
use crate::publisher::Publisher;
use log::{ info, debug };


/// A publisher that appends every message as one line to the file
/// `{dirpath}{queue_name}.jsonl`. Other processes can tail the file to
/// consume the queue.
///
/// The open file handle is the channel. It is opened on the first send
/// and dropped after any failure so the next send opens it again.
#[derive(Debug)]
pub struct Localfile {

	/// The directory the queue file lives in. Always ends with a `/`.
	dirpath_str: String,

	/// The name of the queue, used as the file name
	queue_name: String,

	/// The outbound channel. Empty until the first send and after a reset.
	channel: Mutex<Option<File>>,

}

impl Localfile {

	/// Create a new localfile publisher. The directory is checked on every
	/// send rather than here, a missing directory is a fatal send failure.
	pub fn new(dirpath: &Path, queue_name: &str) -> Result<Localfile, std::io::Error> {

		// Convert the directory path into a string for easy access in future functions
		let dirpath_str = match dirpath.to_path_buf().into_os_string().into_string() {

			Ok(dirpath) => dirpath,
			Err(_) => return Err(Error::new(ErrorKind::InvalidInput, "The dirpath did not contain valid unicode characters."))

		};

		let publisher = Localfile {
			dirpath_str,
			queue_name: queue_name.to_string(),
			channel: Mutex::new(None)
		};

		// do a check that the dirpath is a directory and that it ends with a `/` char
		publisher.check_dirpath()?;

		if publisher.queue_name.trim().is_empty() {
			return Err(Error::new(ErrorKind::InvalidInput, "The queue name has no characters in it."));
		}

		info!(target: "queue", "Initialised Localfile queue publisher writing {} to {}", publisher.queue_name, publisher.dirpath_str);

		Ok(publisher)

	}

	/// make sure that the path looks like a directory
	fn check_dirpath(&self) -> Result<(), std::io::Error> {

		if self.dirpath_str.is_empty() {
			let error_message = format!("The dirpath url: {} has no characters in it.", &self.dirpath_str);
			return Err(Error::new(ErrorKind::InvalidInput, error_message));
		}

		if !self.dirpath_str.ends_with('/') {
			let error_message = format!("The dirpath url: {} did not end with a / character.", &self.dirpath_str);
			return Err(Error::new(ErrorKind::InvalidInput, error_message));
		}

		Ok(())

	}

	/// The file messages are appended to
	pub fn filepath(&self) -> String {

		format!("{}{}.jsonl", self.dirpath_str, self.queue_name)

	}

	/// Whether the publisher currently holds an open file
	pub async fn is_connected(&self) -> bool {

		self.channel.lock().await.is_some()

	}

	/// Write one line to the queue file, opening it first if needed
	async fn write_line(&self, line: &[u8]) -> Result<(), std::io::Error> {

		let mut channel = self.channel.lock().await;

		if channel.is_none() {

			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(self.filepath())
				.await?;

			debug!(target: "queue", "Opened {} for writing.", self.filepath());
			*channel = Some(file);

		}

		let result = match channel.as_mut() {
			Some(file) => match file.write_all(line).await {
				Ok(_) => file.flush().await,
				Err(e) => Err(e),
			},
			None => Err(Error::new(ErrorKind::NotConnected, "The queue file is not open.")),
		};

		if result.is_err() {
			*channel = None;
		}

		result

	}

}

#[async_trait]
impl Publisher for Localfile {

	fn target(&self) -> &str {

		&self.dirpath_str

	}

	fn queue_name(&self) -> &str {

		&self.queue_name

	}

	async fn send(&self, message_body: &str) -> Result<(), PublishError> {

		if let Err(e) = serde_json::from_str::<serde_json::Value>(message_body) {
			return Err(PublishError::Fatal(format!("the message body is not valid JSON: {}", e)));
		}

		// a handle to a file in a deleted directory would keep accepting
		// writes that nobody can read
		let is_dir = tokio::fs::metadata(&self.dirpath_str)
			.await
			.map_or(false, |metadata| metadata.is_dir());

		if !is_dir {
			self.close().await;
			return Err(PublishError::Fatal(format!("the queue directory {} does not exist", self.dirpath_str)));
		}

		let mut line = message_body.replace('\n', " ");
		line.push('\n');

		self.write_line(line.as_bytes()).await.map_err(|e| classify_io(&e))

	}

	async fn close(&self) {

		self.channel.lock().await.take();

	}

}


/// Decide whether a filesystem error is worth retrying
pub fn classify_io(error: &std::io::Error) -> PublishError {

	match error.kind() {

		ErrorKind::NotFound
		| ErrorKind::PermissionDenied
		| ErrorKind::InvalidInput
		| ErrorKind::InvalidData => PublishError::Fatal(format!("the queue file cannot be written: {}", error)),

		_ => PublishError::Transient(format!("the queue file could not be written: {}", error)),

	}

}

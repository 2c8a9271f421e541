use serde::de::Error;
use serde::*;
use serde_derive::{Deserialize};
use std::net::{ Ipv4Addr };
use std::path::PathBuf;
use std::time::Duration;
use handlers::todo::PublishMode;
use queue::retry::RetryPolicy;

/// Top level container of all the fields in the config file
#[derive(Debug, Deserialize, Default)]
pub struct Config {

   /// settings for the API
   #[serde(default)]
   pub api: Api,

   /// settings for the item store and the event log
   #[serde(default)]
   pub store: Store,

   /// settings for how events are published
   #[serde(default)]
   pub publish: Publish,

   /// the queue events are published to. Events are not published
   /// anywhere when this table is left out.
   #[serde(default)]
   pub queue: Option<Queue>,

}

/// Settings for the API
#[derive(Debug, Deserialize)]
pub struct Api {

   /// the ip that the API will listen for requests on
   #[serde(default="default_ip")]
   pub ip: Ipv4Addr,

   /// the port number that the API will listen for requests on
   #[serde(default="default_port")]
   pub port: u16,

   /// the maximum size of an api request measured in bytes
   #[serde(default="default_request_size")]
   pub max_request_size: u64,

}


/// enable default values when declaring the API config
impl Default for Api {

    fn default() -> Api {

      Api {
         ip: default_ip(),
         port: default_port(),
         max_request_size: default_request_size()
      }

    }

}


/// default the ip field to "127.0.0.1"
fn default_ip() -> Ipv4Addr {
	Ipv4Addr::new(127, 0, 0, 1)
}


/// default the port field to 3030
fn default_port() -> u16 {
	3030
}


/// default the max_request_size field to 16kb
fn default_request_size() -> u64 {
   1024 * 16
}


/// Settings for where to-do items and events are saved
#[derive(Debug, Deserialize)]
pub struct Store {

   /// The directory items and the event log are saved in. Items go in the
   /// `items/` child directory and the log in `events.jsonl`.
   #[serde(default="default_store_dirpath", deserialize_with="de_dirpath")]
   pub dirpath: PathBuf,

   /// Whether mutations append their events to the event log
   #[serde(default="default_event_log")]
   pub event_log: bool,

}

impl Default for Store {

    fn default() -> Store {

        Store {
            dirpath: default_store_dirpath(),
            event_log: default_event_log(),
        }

    }

}

impl Store {

    /// The directory the items are saved in
    pub fn items_dirpath(&self) -> PathBuf {
        self.dirpath.join("items")
    }

    /// The file the event log is saved to
    pub fn event_log_filepath(&self) -> PathBuf {
        self.dirpath.join("events.jsonl")
    }

}

/// default the store dirpath field to "./data/"
fn default_store_dirpath() -> PathBuf {
   PathBuf::from("./data/")
}

fn default_event_log() -> bool {
   true
}


/// Settings for how events are published to the queue
#[derive(Debug, Deserialize)]
pub struct Publish {

   /// Either "fire_and_forget" (publication failures are logged and the
   /// caller never hears about them) or "strict" (the caller waits for the
   /// queue and is told when publication fails).
   #[serde(default, deserialize_with="de_publish_mode")]
   pub mode: PublishMode,

   /// How many times an event is offered to the queue. One means an
   /// event is dropped after the first failure.
   #[serde(default="default_max_attempts", deserialize_with="de_max_attempts")]
   pub max_attempts: u32,

   /// Milliseconds to wait before the first retry
   #[serde(default="default_base_delay")]
   pub base_delay_ms: u64,

   /// The longest wait between two retries in milliseconds
   #[serde(default="default_max_delay")]
   pub max_delay_ms: u64,

}

impl Default for Publish {

    fn default() -> Publish {

        Publish {
            mode: PublishMode::default(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }

    }

}

impl Publish {

    /// The retry policy these settings describe
    pub fn retry_policy(&self) -> RetryPolicy {

        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }

    }

}

fn default_max_attempts() -> u32 {
   1
}

fn default_base_delay() -> u64 {
   100
}

fn default_max_delay() -> u64 {
   5000
}

/// Make sure the mode is either "fire_and_forget" or "strict"
fn de_publish_mode<'de, D: Deserializer<'de>>(d: D) -> Result<PublishMode, D::Error> {

    let mut mode = String::deserialize(d)?;
    mode.make_ascii_lowercase();

    match mode.as_str() {
        "fire_and_forget" => Ok(PublishMode::FireAndForget),
        "strict" => Ok(PublishMode::Strict),
        _ => Err(D::Error::custom("The [publish] mode was not one of: ['fire_and_forget', 'strict']")),
    }

}

/// Make sure at least one attempt is made to publish an event
fn de_max_attempts<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {

    let max_attempts = u32::deserialize(d)?;

    if max_attempts == 0 {
        return Err(D::Error::custom("The [publish] max_attempts must be at least 1."));
    }

    Ok(max_attempts)

}


/// The queue variations
#[derive(Debug, Deserialize)]
#[serde(tag="type", rename_all="lowercase")]
pub enum Queue {

   /// Posts events to a broker's REST endpoint
   Http(HttpQueue),

   /// Appends events to a file
   Localfile(LocalfileQueue),

}

/// Settings for the HTTP queue
#[derive(Debug, Deserialize)]
pub struct HttpQueue {

    /// The base URL of the broker
    #[serde(deserialize_with="de_connection_target")]
    pub connection_target: String,

    /// The name of the queue on the broker
    #[serde(deserialize_with="de_queue_name")]
    pub queue_name: String,

    /// Sent as the Authorization header when present
    #[serde(default)]
    pub token: Option<String>,

    /// How long a single send may take in milliseconds
    #[serde(default="default_timeout")]
    pub timeout_ms: u64,

}

fn default_timeout() -> u64 {
   5000
}

/// Settings for the Localfile queue
#[derive(Debug, Deserialize)]
pub struct LocalfileQueue {

    /// The directory the queue file is written to
    #[serde(deserialize_with="de_dirpath")]
    pub dirpath: PathBuf,

    /// The name of the queue, used as the file name
    #[serde(deserialize_with="de_queue_name")]
    pub queue_name: String,

}


/// Check that the path points at a directory and ends with a / character
fn de_dirpath<'de, D: Deserializer<'de>>(d: D) -> Result<PathBuf, D::Error> {

    let s = String::deserialize(d)?;

    if s.is_empty() {
        let error_message = format!("The dirpath: {} has no characters in it.", s);
        return Err(D::Error::custom(error_message));
    }

    if !s.ends_with('/') {
        let error_message = format!("The dirpath: {} did not end with a / character.", s);
        return Err(D::Error::custom(error_message));
    }

    Ok(PathBuf::from(s))

}

fn de_queue_name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {

    let s = String::deserialize(d)?;

    if s.trim().is_empty() {
        return Err(D::Error::custom("The [queue] queue_name has no characters in it."));
    }

    Ok(s)

}

fn de_connection_target<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {

    let s = String::deserialize(d)?;

    if !s.starts_with("http://") && !s.starts_with("https://") {
        let error_message = format!("The [queue] connection_target: {} is not an http or https URL.", s);
        return Err(D::Error::custom(error_message));
    }

    Ok(s)

}

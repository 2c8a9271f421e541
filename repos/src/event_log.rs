use std::collections::HashSet;
use std::fs::{ create_dir_all, read_to_string };
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use domains::event::EventRecord;
use domains::errors::PersistenceError;
use uuid::Uuid;
use log::{ info, warn, error };


/// The Event Log is a durable, append-only history of Event Records.
/// Records can be appended and listed but never changed or removed.
/// When a file is given each record is written to it as one line of JSON.
#[derive(Debug, Default)]
pub struct Repo {

	/// Every record in the log in the order it was appended
	events: Vec<EventRecord>,

	/// The ids of every record so duplicates can be refused
	event_ids: HashSet<Uuid>,

	/// The file the log is saved to
	filepath: Option<PathBuf>,

}


impl Repo {

	/// Open an event log. Records already in the file are loaded in the
	/// order they were written. Pass `None` to keep the log in memory only.
	pub fn new(filepath: Option<PathBuf>) -> Result<Repo, std::io::Error> {

		let filepath = match filepath {
			Some(filepath) => filepath,
			None => return Ok(Repo::default())
		};

		if let Some(dir) = filepath.parent() {
			if !dir.as_os_str().is_empty() {
				create_dir_all(dir)?;
			}
		}

		let events = match read_to_string(&filepath) {
			Ok(content) => {

				let (events, valid_len) = parse_log(&content)?;

				// cut off a record that was only half written so the next
				// append starts on a fresh line
				if valid_len < content.len() {
					warn!(target: "events", "Dropped a half written record from the end of {}.", &filepath.display());
					truncate(&filepath, valid_len as u64)?;
				}

				events

			},
			Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
			Err(e) => {
				error!(target: "events", "Failed to read the event log at {}", &filepath.display());
				return Err(e);
			}
		};

		let event_ids = events.iter().map(|event| event.get_id()).collect();

		info!(target: "events", "Loaded {} events from {}.", events.len(), &filepath.display());

		Ok(Repo { events, event_ids, filepath: Some(filepath) })

	}

	/// Append a record to the end of the log and return the stored copy.
	/// The record must name its type, aggregate and aggregate kind, and its
	/// id must not already be in the log.
	pub async fn append(&mut self, event: EventRecord) -> Result<EventRecord, PersistenceError> {

		check_event(&event)?;

		if self.event_ids.contains(&event.get_id()) {
			return Err(PersistenceError::Conflict(format!(
				"an event with the id {} is already in the log",
				event.get_id()
			)));
		}

		if let Some(filepath) = &self.filepath {

			let mut line = serde_json::to_string(&event)?;
			line.push('\n');

			let mut file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(filepath)
				.await?;

			let len = file.metadata().await?.len();

			if let Err(e) = write_line(&mut file, &line).await {

				// take back whatever part of the line made it to disk
				if let Err(undo) = file.set_len(len).await {
					error!(target: "events", "Could not remove a half written record from {}: {}", &filepath.display(), undo);
				}

				return Err(e.into());

			}

		}

		self.event_ids.insert(event.get_id());
		self.events.push(event.clone());

		info!(target: "events", "Appended {} event {} for aggregate {}.", event.get_type(), event.get_id(), event.get_aggregate_id());

		Ok(event)

	}

	/// Every record in the log, oldest first
	pub fn list_all(&self) -> Vec<EventRecord> {

		self.events.clone()

	}

	/// Every record describing one aggregate, oldest first
	pub fn list_by_aggregate(&self, aggregate_id: Uuid) -> Vec<EventRecord> {

		self
			.events
			.iter()
			.filter(|event| event.get_aggregate_id() == aggregate_id)
			.cloned()
			.collect()

	}

	/// Returns a count of the number of records in the log.
	pub fn event_count(&self) -> usize {

		self.events.len()

	}

}


/// Refuse records that don't say what happened or to what
fn check_event(event: &EventRecord) -> Result<(), PersistenceError> {

	if event.get_type().trim().is_empty() {
		return Err(PersistenceError::Invalid("the event_type field is empty".to_string()));
	}

	if event.get_aggregate_id().is_nil() {
		return Err(PersistenceError::Invalid("the aggregate_id field is empty".to_string()));
	}

	if event.get_aggregate_name().trim().is_empty() {
		return Err(PersistenceError::Invalid("the aggregate_name field is empty".to_string()));
	}

	Ok(())

}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> Result<(), std::io::Error> {

	file.write_all(line.as_bytes()).await?;
	file.sync_data().await

}

fn truncate(filepath: &Path, len: u64) -> Result<(), std::io::Error> {

	std::fs::OpenOptions::new()
		.write(true)
		.open(filepath)?
		.set_len(len)

}

/// Parse the lines of an event log file. Also returns how many bytes of
/// the content are whole records. A last line with no newline that can't
/// be parsed is an append that was cut short and is left out. Any other
/// unreadable line means the log is damaged.
fn parse_log(content: &str) -> Result<(Vec<EventRecord>, usize), std::io::Error> {

	let mut events = Vec::new();
	let mut valid_len = 0;

	for line in content.split_inclusive('\n') {

		if !line.trim().is_empty() {

			match serde_json::from_str::<EventRecord>(line) {
				Ok(event) => events.push(event),
				Err(_) if !line.ends_with('\n') => return Ok((events, valid_len)),
				Err(e) => return Err(std::io::Error::new(ErrorKind::InvalidData, e)),
			}

		}

		valid_len += line.len();

	}

	Ok((events, valid_len))

}

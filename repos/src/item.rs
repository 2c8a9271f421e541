use std::collections::BTreeMap;
use std::fs::{ read_to_string, read_dir, create_dir_all };
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs::{ write, rename, remove_file, create_dir_all as create_dir_all_async };
use domains::item::{ ItemStatus, ToDoItem };
use domains::errors::PersistenceError;
use uuid::Uuid;
use log::{ info, warn, error };


/// This repository is the entity store for to-do items. Items are
/// addressed by (user_id, item_id) and, when a directory is given, each
/// one is saved to its own file so that it survives a restart.
///
/// Every write hits the file before the in-memory copy is changed, so a
/// failed write leaves the repo exactly as it was.
#[derive(Debug)]
pub struct Repo {

	/// All the items in this repository
	items: BTreeMap<(Uuid, i64), ToDoItem>,

	/// The id that will be handed to the next item created without one
	next_item_id: i64,

	/// The location where the items are saved as files
	dirpath: Option<PathBuf>,

}


impl Default for Repo {

	fn default() -> Self {

		Repo {
			items: BTreeMap::new(),
			next_item_id: 1,
			dirpath: None
		}

	}

}


impl Repo {

	/// Create a new item repo. Pass `None` to keep the items in memory only.
	pub fn new(dir: Option<PathBuf>) -> Result<Repo, std::io::Error> {

		let dir = match dir {
			Some(dir) => dir,
			None => return Ok(Repo::default())
		};

		// create the items directory path if it doesn't already exist
		if let Err(e) = create_dir_all(&dir) {
			error!(target: "todos", "Failed to create the directory {}", &dir.display());
			return Err(e);
		}

		let items = get_items(&dir)?;
		let next_item_id = items
			.keys()
			.map(|(_, item_id)| *item_id)
			.max()
			.unwrap_or(0)
			.saturating_add(1);

		info!(target: "todos", "Loaded {} to-do items from {}.", items.len(), &dir.display());

		Ok(Repo { items, next_item_id, dirpath: Some(dir) })

	}

	/// Get a single item belonging to a user
	pub fn find_by_id(&self, user_id: Uuid, item_id: i64) -> Option<ToDoItem> {

		self.items.get(&(user_id, item_id)).cloned()

	}

	/// Get all the items belonging to a user, ordered by item id
	pub fn find_all(&self, user_id: Uuid) -> Vec<ToDoItem> {

		self
			.items
			.range((user_id, i64::MIN)..=(user_id, i64::MAX))
			.map(|(_, item)| item.clone())
			.collect()

	}

	/// Get all the items belonging to a user that are at a certain status
	pub fn find_by_status(&self, user_id: Uuid, item_status: ItemStatus) -> Vec<ToDoItem> {

		self
			.find_all(user_id)
			.into_iter()
			.filter(|item| item.item_status == item_status)
			.collect()

	}

	/// The id the next item created without one will receive
	pub fn next_item_id(&self) -> i64 {

		self.next_item_id

	}

	/// A count of every item in the repo, across all users
	pub fn item_count(&self) -> usize {

		self.items.len()

	}

	/// Add a new item. An item id of 0 or less asks the repo to pick one.
	/// Adding an item whose id the user already has is a conflict.
	pub async fn add(&mut self, mut item: ToDoItem) -> Result<ToDoItem, PersistenceError> {

		if item.item_id <= 0 {
			item.item_id = self.next_item_id;
		}

		// the id after this one has to exist for the counter to move on
		if item.item_id.checked_add(1).is_none() {
			return Err(PersistenceError::Invalid(format!(
				"the to-do item id {} is too large",
				item.item_id
			)));
		}

		if self.items.contains_key(&(item.user_id, item.item_id)) {
			return Err(PersistenceError::Conflict(format!(
				"the to-do item {} already exists",
				item.item_id
			)));
		}

		self.save(item).await

	}

	/// Replace an existing item. Updating an item that isn't in the repo
	/// is rejected, callers are expected to look the item up first.
	pub async fn update(&mut self, item: ToDoItem) -> Result<ToDoItem, PersistenceError> {

		if !self.items.contains_key(&(item.user_id, item.item_id)) {
			return Err(PersistenceError::Invalid(format!(
				"the to-do item {} does not exist",
				item.item_id
			)));
		}

		self.save(item).await

	}

	/// Remove an item and return what it looked like before it was
	/// removed. Returns `None` if the user has no such item.
	pub async fn remove(&mut self, user_id: Uuid, item_id: i64) -> Result<Option<ToDoItem>, PersistenceError> {

		if !self.items.contains_key(&(user_id, item_id)) {
			return Ok(None);
		}

		if let Some(dir) = &self.dirpath {

			match remove_file(item_path(dir, user_id, item_id)).await {

				Ok(_) => (),

				// someone else already removed the file
				Err(error) if error.kind() == ErrorKind::NotFound => {
					warn!(target: "todos", "The file for to-do item {} was already gone.", item_id);
				},

				Err(error) => return Err(error.into()),

			}

		}

		Ok(self.items.remove(&(user_id, item_id)))

	}

	/// Write an item to file (if the repo has a directory) and then to
	/// the in-memory map
	async fn save(&mut self, item: ToDoItem) -> Result<ToDoItem, PersistenceError> {

		if let Some(dir) = &self.dirpath {

			let file_content = serde_json::to_string(&item)?;
			let user_dir = dir.join(item.user_id.to_string());
			let file_path = item_path(dir, item.user_id, item.item_id);
			let tmp_path = file_path.with_extension("json.tmp");

			// write to a temporary file and move it into place so that a
			// crash never leaves half an item on disk
			create_dir_all_async(&user_dir).await?;
			write(&tmp_path, file_content).await?;
			rename(&tmp_path, &file_path).await?;

		}

		if item.item_id >= self.next_item_id {
			self.next_item_id = item.item_id.saturating_add(1);
		}

		self.items.insert((item.user_id, item.item_id), item.clone());

		Ok(item)

	}

}


/// The path of the file an item is saved in
fn item_path(dir: &Path, user_id: Uuid, item_id: i64) -> PathBuf {

	dir.join(user_id.to_string()).join(format!("{}.json", item_id))

}

/// Read all the item files under the directory provided. Each user has
/// their own child directory.
fn get_items(dir: &Path) -> Result<BTreeMap<(Uuid, i64), ToDoItem>, std::io::Error> {

	let mut items = BTreeMap::new();

	read_dir(dir)?.try_for_each(|entry| -> Result<(), std::io::Error> {

		let path = entry?.path();

		if path.is_dir() {

			items.extend(get_items(&path)?);

		}
		else if path.extension().map_or(false, |ext| ext == "json") {

			let item = read_item_file(&path)?;
			items.insert((item.user_id, item.item_id), item);

		}

		Ok(())

	})?;

	Ok(items)

}

/// Read a file containing a single item
fn read_item_file(filepath: &Path) -> Result<ToDoItem, std::io::Error> {

	let file_content = read_to_string(filepath)?;

	serde_json::from_str::<ToDoItem>(&file_content).map_err(|e| {

		error!(target: "todos", "Failed to parse the file at {} to a to-do item", &filepath.display());
		std::io::Error::new(ErrorKind::InvalidData, e)

	})

}

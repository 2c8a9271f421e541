use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;


/// The longest title a to-do item can have.
pub const MAX_TITLE_LENGTH: usize = 100;


/// The stage of work a to-do item is at. The set is closed: anything
/// that is not one of these names (or its number) is rejected.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemStatus {

    /// No status was provided.
    #[default]
    NotSpecified,
    /// The task has been created, but it is not started.
    ToDo,
    /// The task has been in progress, but it is not completed.
    InProgress,
    /// The task has been completed.
    Completed,

}

impl ItemStatus {

    /// The name the status is known by on the wire and in event payloads
    pub fn as_str(&self) -> &'static str {

        match self {
            ItemStatus::NotSpecified => "NotSpecified",
            ItemStatus::ToDo => "ToDo",
            ItemStatus::InProgress => "InProgress",
            ItemStatus::Completed => "Completed",
        }

    }

}

impl fmt::Display for ItemStatus {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }

}

/// Parse a status from a path segment. Names are matched ignoring case and
/// the numeric value of each status is accepted too.
impl FromStr for ItemStatus {

    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {

        match s.to_ascii_lowercase().as_str() {
            "notspecified" | "0" => Ok(ItemStatus::NotSpecified),
            "todo" | "1" => Ok(ItemStatus::ToDo),
            "inprogress" | "2" => Ok(ItemStatus::InProgress),
            "completed" | "3" => Ok(ItemStatus::Completed),
            _ => Err(format!("'{}' is not one of: ['NotSpecified', 'ToDo', 'InProgress', 'Completed']", s)),
        }

    }

}


/// A to-do item as it is held in the entity store. Items are owned by a
/// single user and addressed by the pair (user_id, item_id).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all="snake_case")]
pub struct ToDoItem {

    /// Identifier of the item. Unique within the store.
    pub item_id: i64,

    /// What needs doing.
    pub item_title: String,

    /// The stage of work the item is at.
    pub item_status: ItemStatus,

    /// The user who owns the item.
    pub user_id: Uuid,

    /// When the item should be completed by.
    #[serde(with="time::serde::rfc3339::option", default)]
    pub item_due_on: Option<OffsetDateTime>,

}

impl ToDoItem {

    /// Create the item a user asked for from the body of their request.
    pub fn from_draft(user_id: Uuid, item_id: i64, draft: &ItemDraft) -> ToDoItem {

        ToDoItem {
            item_id,
            item_title: draft.item_title.clone(),
            item_status: draft.item_status,
            user_id,
            item_due_on: draft.item_due_on,
        }

    }

    /// Overwrite the mutable fields of the item with the ones in a draft.
    pub fn apply(&mut self, draft: &ItemDraft) {

        self.item_title = draft.item_title.clone();
        self.item_status = draft.item_status;
        self.item_due_on = draft.item_due_on;

    }

}


/// The body of a create or update request. The item id is optional when
/// creating an item (the store assigns one) and required when updating.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all="snake_case")]
pub struct ItemDraft {

    /// Identifier of the item to update. Leave empty (or 0) on create.
    #[serde(default)]
    pub item_id: Option<i64>,

    /// What needs doing.
    #[serde(default)]
    pub item_title: String,

    /// The stage of work the item is at.
    #[serde(default)]
    pub item_status: ItemStatus,

    /// When the item should be completed by.
    #[serde(with="time::serde::rfc3339::option", default)]
    pub item_due_on: Option<OffsetDateTime>,

}

impl ItemDraft {

    /// Check the draft against the item rules. Every broken rule is
    /// reported, not just the first one.
    pub fn validate(&self, now: OffsetDateTime) -> Result<(), Vec<String>> {

        let mut errors = Vec::new();

        if self.item_title.trim().is_empty() {
            errors.push("ToDo Item Title should not be empty".to_string());
        }
        else if self.item_title.chars().count() > MAX_TITLE_LENGTH {
            errors.push(format!("ToDo Item Title should be no more than {} characters", MAX_TITLE_LENGTH));
        }

        if self.item_status == ItemStatus::NotSpecified {
            errors.push("ToDo Item Status should not be empty".to_string());
        }

        match self.item_due_on {
            None => errors.push("ToDo Item Due Date should not be empty".to_string()),
            Some(due_on) if due_on <= now => errors.push("ToDo Item Due Date must be in future".to_string()),
            Some(_) => (),
        }

        if errors.is_empty() {
            Ok(())
        }
        else {
            Err(errors)
        }

    }

    /// Check a draft sent to replace an item. On top of the item rules it
    /// has to name the item it replaces.
    pub fn validate_update(&self, now: OffsetDateTime) -> Result<(), Vec<String>> {

        let mut errors = match self.validate(now) {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        match self.item_id {
            None => errors.insert(0, "ToDo Item Id should not be empty".to_string()),
            Some(item_id) if item_id <= 0 => errors.insert(0, "ToDo Item Id should be greater than 0".to_string()),
            Some(_) => (),
        }

        if errors.is_empty() {
            Ok(())
        }
        else {
            Err(errors)
        }

    }

}

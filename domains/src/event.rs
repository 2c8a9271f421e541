use serde_derive::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;
use crate::item::{ ItemStatus, ToDoItem };


/// The aggregate name carried by every event the to-do service produces.
pub const AGGREGATE_NAME: &str = "ToDoItem";


/// The kinds of mutation that produce an Event Record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {

    /// A to-do item was created.
    ItemAdded,
    /// A to-do item was replaced by an update.
    ItemUpdated,
    /// The status of a to-do item was changed.
    ItemPatched,
    /// A to-do item was removed.
    ItemDeleted,

}

impl EventKind {

    /// The tag stored in the `event_type` field
    pub fn as_str(&self) -> &'static str {

        match self {
            EventKind::ItemAdded => "ItemAdded",
            EventKind::ItemUpdated => "ItemUpdated",
            EventKind::ItemPatched => "ItemPatched",
            EventKind::ItemDeleted => "ItemDeleted",
        }

    }

}


/// An Event Record describes one mutation of an aggregate. It cannot be
/// changed once it is constructed: the fields are private and there
/// are only getters.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all="snake_case")]
pub struct EventRecord {

    /// The unique identifier of this event.
    #[serde(default="new_uuid")]
    event_id: Uuid,

    /// The action that happened, for example "ItemAdded".
    event_type: String,

    /// The identifier of the aggregate the event describes.
    aggregate_id: Uuid,

    /// The kind of aggregate the event describes, for example "ToDoItem".
    aggregate_name: String,

    /// The time and date when this event was first created.
    /// Defaults to time and date it entered the service if not provided.
    #[serde(with="time::serde::rfc3339", default="now_timestamp")]
    created_at: OffsetDateTime,

    /// A serialized snapshot of the aggregate when the event happened.
    #[serde(default)]
    payload: String,

}

impl EventRecord {

    /// Create a new Event Record, stamping it with a fresh id and the
    /// current time.
    pub fn new(
        event_type: &str,
        aggregate_id: Uuid,
        aggregate_name: &str,
        payload: String
    ) -> EventRecord {

        EventRecord {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            aggregate_id,
            aggregate_name: aggregate_name.to_string(),
            created_at: OffsetDateTime::now_utc(),
            payload,
        }

    }

    /// Describe a mutation of a to-do item. Added, updated and deleted
    /// events carry a full snapshot of the item. Patched events only carry
    /// the item id and its new status.
    pub fn for_item(kind: EventKind, item: &ToDoItem) -> Result<EventRecord, serde_json::Error> {

        let payload = match kind {
            EventKind::ItemPatched => status_change(item.item_id, item.item_status),
            _ => serde_json::to_string(item)?,
        };

        Ok(EventRecord::new(kind.as_str(), item.user_id, AGGREGATE_NAME, payload))

    }

    /// Getter for the event_id field
    pub fn get_id(&self) -> Uuid {

        self.event_id

    }

    /// Getter for the event_type field
    pub fn get_type(&self) -> &str {

        &self.event_type

    }

    /// Getter for the aggregate_id field
    pub fn get_aggregate_id(&self) -> Uuid {

        self.aggregate_id

    }

    /// Getter for the aggregate_name field
    pub fn get_aggregate_name(&self) -> &str {

        &self.aggregate_name

    }

    /// Getter for the created_at field
    pub fn get_created_at(&self) -> OffsetDateTime {

        self.created_at

    }

    /// Getter for the payload field
    pub fn get_payload(&self) -> &str {

        &self.payload

    }

    /// Render the record as the body of a queue message.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {

        serde_json::to_string(self)

    }

}


/// The minimal payload of an ItemPatched event.
fn status_change(item_id: i64, item_status: ItemStatus) -> String {

    json!({
        "item_id": item_id,
        "item_status": item_status
    }).to_string()

}

fn new_uuid() -> Uuid {
    Uuid::new_v4()
}

fn now_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

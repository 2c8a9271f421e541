use serde_derive::{Deserialize, Serialize};
use handlers::publish::StatsSnapshot;
use uuid::Uuid;

/// The url parameters of the DELETE request handled by the /todos endpoint
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DeleteQuery {

    /// The id of the item to delete
    #[serde(rename="itemId", alias="item_id")]
    pub item_id: Option<i64>,

}

/// the fields that can be used as URL query parameters
/// in a get request to /events
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct EventsQuery {
    pub aggregate_id: Option<Uuid>,
}

/// An API health check response serializable to JSON.
#[derive(Debug, Serialize, Clone)]
pub struct HealthResponse {
    pub code: u16,
    pub state: String,
    pub published: StatsSnapshot,
}

use thiserror::Error;


/// A store rejected a read or a write.
#[derive(Debug, Error)]
pub enum PersistenceError {

    /// The record or item broke one of the rules of the store.
    #[error("the store rejected the write: {0}")]
    Invalid(String),

    /// The write clashed with something already in the store, for example
    /// an event id or item id that is already taken.
    #[error("the write conflicts with an existing entry: {0}")]
    Conflict(String),

    /// The filesystem backing the store failed.
    #[error("the store could not be read or written: {0}")]
    Io(#[from] std::io::Error),

    /// The entry could not be converted to or from its stored form.
    #[error("the entry could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

}


/// A message could not be sent to the queue. The two variants keep apart
/// failures worth retrying from failures that will never succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {

    /// A network blip, a timeout or the broker throttling the sender.
    #[error("transient failure sending to the queue: {0}")]
    Transient(String),

    /// A malformed message or a destination that does not exist.
    #[error("fatal failure sending to the queue: {0}")]
    Fatal(String),

}

impl PublishError {

    /// Whether sending the same message again could succeed.
    pub fn is_transient(&self) -> bool {

        matches!(self, PublishError::Transient(_))

    }

    /// A stable label for logs and counters.
    pub fn kind(&self) -> &'static str {

        match self {
            PublishError::Transient(_) => "transient",
            PublishError::Fatal(_) => "fatal",
        }

    }

}


/// A mutation could not be carried out. A target that does not exist is
/// not an error: the coordinator returns an empty result for it instead.
#[derive(Debug, Error)]
pub enum MutationError {

    /// The entity store or the event log rejected a write.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The event could not be published and the coordinator is running in
    /// strict mode.
    #[error(transparent)]
    Publish(#[from] PublishError),

}

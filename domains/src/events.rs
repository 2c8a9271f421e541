use tokio::sync::oneshot;
use crate::errors::PublishError;
use crate::event::EventRecord;


/// A request asking the bus to send an Event Record to the queue.
#[derive(Debug)]
pub struct Publish {

    /// The record to send.
    pub record: EventRecord,

    /// Completed with the outcome of the send. Left empty when the
    /// sender does not want to wait (fire and forget).
    pub ack: Option<oneshot::Sender<Result<(), PublishError>>>,

}

impl Publish {

    /// A publication nobody waits on.
    pub fn fire_and_forget(record: EventRecord) -> Publish {

        Publish { record, ack: None }

    }

    /// A publication whose outcome is reported on the returned receiver.
    pub fn acknowledged(record: EventRecord) -> (Publish, oneshot::Receiver<Result<(), PublishError>>) {

        let (tx, rx) = oneshot::channel();
        (Publish { record, ack: Some(tx) }, rx)

    }

}

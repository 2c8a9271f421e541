use std::sync::atomic::{ AtomicU64, Ordering };
use serde_derive::Serialize;
use domains::errors::PublishError;
use domains::events::Publish;
use queue::publisher::Publisher;
use queue::retry::{ send_with_retry, RetryPolicy };
use log::{ debug, warn, error };


/// Counters describing how deliveries to the queue went. Transient and
/// fatal failures are counted apart so operators can tell them apart.
#[derive(Debug, Default)]
pub struct PublishStats {

    sent: AtomicU64,
    transient: AtomicU64,
    fatal: AtomicU64,

}

/// A copy of the counters at one point in time
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all="snake_case")]
pub struct StatsSnapshot {

    /// Records delivered to the queue
    pub sent: u64,
    /// Records dropped after a transient failure
    pub transient: u64,
    /// Records dropped after a fatal failure
    pub fatal: u64,

}

impl PublishStats {

    /// Read all the counters
    pub fn snapshot(&self) -> StatsSnapshot {

        StatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            transient: self.transient.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
        }

    }

    fn record(&self, result: &Result<u32, PublishError>) {

        let counter = match result {
            Ok(_) => &self.sent,
            Err(PublishError::Transient(_)) => &self.transient,
            Err(PublishError::Fatal(_)) => &self.fatal,
        };

        counter.fetch_add(1, Ordering::Relaxed);

    }

}


/// Send the record in a publication to the queue and report the outcome to
/// whoever is waiting on it. With no queue configured there is nothing to
/// do and the publication succeeds straight away.
///
/// Failures are logged and counted here and never travel further than the
/// acknowledgement.
pub async fn deliver(
    publisher: Option<&dyn Publisher>,
    publish: Publish,
    policy: &RetryPolicy,
    stats: &PublishStats
) -> Result<(), PublishError> {

    let Publish { record, ack } = publish;

    let result = match publisher {

        None => Ok(()),

        Some(publisher) => {

            let sent = match record.to_message() {
                Ok(message) => send_with_retry(publisher, &message, policy).await,
                Err(e) => Err(PublishError::Fatal(format!("the event could not be serialized: {}", e))),
            };

            stats.record(&sent);

            match &sent {

                Ok(attempts) => debug!(
                    target: "queue",
                    "Sent {} event {} to {} after {} attempt(s).",
                    record.get_type(), record.get_id(), publisher.queue_name(), attempts
                ),

                Err(e @ PublishError::Transient(_)) => warn!(
                    target: "queue",
                    "Dropped {} event {} for {} kind={}: {}",
                    record.get_type(), record.get_id(), publisher.queue_name(), e.kind(), e
                ),

                Err(e @ PublishError::Fatal(_)) => error!(
                    target: "queue",
                    "Dropped {} event {} for {} kind={}: {}",
                    record.get_type(), record.get_id(), publisher.queue_name(), e.kind(), e
                ),

            }

            sent.map(|_| ())

        }

    };

    if let Some(ack) = ack {
        // the caller may have given up waiting, that's fine
        let _ = ack.send(result.clone());
    }

    result

}

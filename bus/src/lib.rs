#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![cfg_attr(test, deny(warnings))]

//! # Message buses
//!
//! The message bus is a queue of Event Records waiting to be published.
//! The coordinator puts each record on the bus while it still holds the
//! item lock, and the bus hands them to the queue publisher one at a time
//! in the order they arrived, so the queue sees events in the same order
//! as the changes they describe.

use std::sync::Arc;
use tokio::sync::mpsc;
use domains::Event;
use handlers::publish::{ deliver, PublishStats };
use queue::publisher::Publisher;
use queue::retry::RetryPolicy;
use log::info;

/// Start listening for new events and forward each publication to the
/// queue. Without a publisher every publication is acknowledged straight
/// away and nothing leaves the service.
pub async fn start(
    publisher: Option<Arc<dyn Publisher>>,
    policy: RetryPolicy,
    stats: Arc<PublishStats>,
) -> (mpsc::UnboundedSender<Event>, tokio::task::JoinHandle<()>) {

    // create a channel to receive events on
    let (tx, mut rx) = mpsc::unbounded_channel();

    let task_handle = tokio::spawn(async move {

        match &publisher {
            Some(publisher) => info!(target: "bus", "Publishing events to {} on {}.", publisher.queue_name(), publisher.target()),
            None => info!(target: "bus", "No queue is configured, events will not be published."),
        }

        // records are delivered one after the other, never concurrently,
        // which is what keeps them in order
        while let Some(event) = rx.recv().await {

            match event {
                Event::Publish(publish) => {
                    let _ = deliver(publisher.as_deref(), publish, &policy, &stats).await;
                },
                Event::Shutdown => rx.close()
            }

        }

        if let Some(publisher) = &publisher {
            publisher.close().await;
        }

        let totals = stats.snapshot();
        info!(
            target: "bus",
            "The bus has shut down. Sent {} events, dropped {} after transient failures and {} after fatal failures.",
            totals.sent, totals.transient, totals.fatal
        );

    });

    (tx, task_handle)

}

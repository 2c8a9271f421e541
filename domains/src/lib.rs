#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![cfg_attr(test, deny(warnings))]

//! # Domains
//!
//! The objects that exist outside the service and are processed within it:
//! the to-do items users create and mutate, and the Event Records that
//! describe every one of those mutations. As well as defining them this
//! crate lays out the rules for creating them so that no invalid item or
//! event makes it into a store or onto a queue.

/// A to-do item is the entity users create, update, patch and delete.
pub mod item;

/// An Event Record is the immutable description of one mutation made
/// to a to-do item.
pub mod event;

/// Less complex messages that can be passed to the message bus.
pub mod events;

/// The error taxonomy shared by the stores, the queue publishers and
/// the mutation coordinator.
pub mod errors;

/// A message for the publication bus. The bus forwards each one to the
/// queue publisher in the order it was received.
#[derive(Debug)]
pub enum Event {

    /// Publish an Event Record to the configured queue.
    Publish(events::Publish),
    /// An event telling the bus to finish what is queued and shut down
    Shutdown

}

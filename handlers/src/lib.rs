#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![cfg_attr(test, deny(warnings))]

//! # Handlers
//!
//! Handlers hold the logic of the service. They are called by the API and
//! the message bus and work on the repos and publishers they are given,
//! they should not be instantiating any repos or storage themselves.

/// The mutation coordinator. Every change made to a to-do item is
/// persisted, described by an Event Record and handed over for publication.
pub mod todo;

/// Delivers Event Records to the queue on behalf of the message bus and
/// keeps count of how each delivery went.
pub mod publish;

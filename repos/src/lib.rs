#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![cfg_attr(test, deny(warnings))]

//! # Repositories
//!
//! A repository holds and persists the state of the service. The item
//! repo is the entity store the to-do endpoints read and write, the event
//! log is the append-only history of every mutation made to it.

/// This repository stores to-do items keyed by the user that owns them
/// and the item id. Each item can be saved to its own file.
pub mod item;

/// This repository stores Event Records in the order they were appended.
/// It never updates or deletes a record.
pub mod event_log;

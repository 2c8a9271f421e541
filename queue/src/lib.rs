#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![cfg_attr(test, deny(warnings))]

//! # Queues
//!
//! A queue publisher sends serialized Event Records to a queue outside
//! the service. Each publisher owns one outbound channel to one queue
//! and tells its callers whether a failed send is worth retrying.

/// The `publisher` defines the shared behaviour for all queue publishers
pub mod publisher;

/// Bounded retries with exponential backoff for transient failures
pub mod retry;

/// A publisher that posts messages to a queue over HTTP
pub mod http;

/// A publisher that appends messages to a file in the local filesystem
pub mod localfile;

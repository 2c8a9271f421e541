#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![cfg_attr(test, deny(warnings))]

//! # Entrypoints
//!
//! Entrypoints are the api layer of the service. Every to-do endpoint
//! expects the id of the signed in user in the `x-user-id` header. Right
//! now it contains the following endpoints:
//!
//! - ** GET /health** - an endpoint to ping to see if the API is available, with publication counters
//! - ** GET /todos** - every to-do item belonging to the user
//! - ** GET /todos/{status}** - the user's to-do items at a status
//! - ** GET /todos/{id}** - a single to-do item
//! - ** POST /todos** - create a to-do item
//! - ** PUT /todos** - replace a to-do item
//! - ** PATCH /todos/{id}/status/{status}** - change the status of a to-do item
//! - ** DELETE /todos?itemId={id}** - delete a to-do item
//! - ** GET /events** - read the event log, optionally for one aggregate
//! - ** POST /events** - append a record to the event log

use log::{ info, error };
use warp::Filter;
use tokio::sync::oneshot;
use std::net::{ Ipv4Addr };
use std::sync::Arc;
use handlers::todo::Coordinator;
use handlers::publish::PublishStats;

/// Logic for the API health check endpoint
mod health;

/// Logic for the to-do item endpoints
mod todos;

/// Logic for the event log endpoints
mod events;

/// Reads the identity of the caller off the request
mod auth;

/// Logic for generic 4xx -> 5xx responses
mod errors;

/// Definitions for the requests and responses used by the endpoints
mod models;


/// Provides a RESTful web server for managing to-do items and reading
/// the events their changes produce.
pub async fn start(
    coordinator: Coordinator,
    stats: Arc<PublishStats>,
    max_request_size: u64,
    ip: Ipv4Addr,
    port: u16,
) -> Result<(oneshot::Sender<()>, tokio::task::JoinHandle<()>), warp::Error> {

    // set up the api endpoints
    let api = endpoints(coordinator, stats, max_request_size);

    // view access logs by setting `RUST_LOG=api`.
    let routes = api
        .with(warp::log("api"))
        .recover(errors::reject_request);

    // create a channel that can be used to send a shutdown
    // request to the api server
    let (tx, rx) = oneshot::channel();

    // create the server and define what to do if it goes down
    let serve_result = warp::serve(routes)
        .try_bind_with_graceful_shutdown((ip.octets(), port), async {
            rx.await.ok();
    });

    match serve_result {

        Ok((addr, server)) => {

            let server_handle = tokio::task::spawn(server);
            info!(target: "api", "API started at {}", addr);
            Ok((tx, server_handle))

        },
        Err(e) => {

            error!(target: "api", "API failed to start: {}", e);
            Err(e)

        }
    }

}

/// Initialise all the endpoints
pub fn endpoints(
    coordinator: Coordinator,
    stats: Arc<PublishStats>,
    max_request_size: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {

    health::init(stats)
        .or(todos::init(coordinator.clone(), max_request_size))
        .or(events::init(coordinator, max_request_size))

}

/// Turn any rejection left over by the endpoints into a JSON error
/// response. Attach this with `recover` when serving the endpoints.
pub use errors::reject_request;

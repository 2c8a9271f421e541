use std::convert::Infallible;
use warp::{ Filter, Rejection, Reply, reply };
use warp::http::StatusCode;
use domains::event::EventRecord;
use domains::errors::PersistenceError;
use handlers::todo::Coordinator;
use crate::errors::error_reply;
use crate::models::EventsQuery;

/// Function that initialises the endpoints at the path /events
pub fn init(
    coordinator: Coordinator,
    max_request_size: u64
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    get(coordinator.clone()).or(post(coordinator, max_request_size))

}


/// Function that initialises the GET endpoint at the path /events
fn get(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("events")
        .and(warp::get())
        .and(warp::query::<EventsQuery>())
        .and(warp::any().map(move || coordinator.clone()))
        .and_then(|query: EventsQuery, coordinator: Coordinator| async move {

            let events = match query.aggregate_id {
                Some(aggregate_id) => coordinator.list_events_for(aggregate_id).await,
                None => coordinator.list_events().await,
            };

            Ok::<_, Infallible>(reply::json(&events))

        })

}


/// Function that initialises the POST endpoint at the path /events
fn post(coordinator: Coordinator, max_request_size: u64) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("events")
        .and(warp::post())
        .and(warp::body::content_length_limit(max_request_size))
        .and(warp::body::json())
        .and(warp::any().map(move || coordinator.clone()))
        .and_then(post_event)

}


/// Append the record to the event log and send the stored copy back
async fn post_event(
    event: EventRecord,
    coordinator: Coordinator
) -> Result<reply::Response, Infallible> {

    let response = match coordinator.append_event(event).await {

        Ok(stored) => reply::with_status(reply::json(&stored), StatusCode::CREATED).into_response(),

        Err(PersistenceError::Invalid(reason)) => error_reply(StatusCode::BAD_REQUEST, format!("Sorry, {}.", reason)),

        Err(PersistenceError::Conflict(reason)) => error_reply(StatusCode::CONFLICT, format!("Sorry, {}.", reason)),

        Err(_) => error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong while creating an event. Please try again in a while.".to_string()
        ),

    };

    Ok(response)

}

use std::convert::Infallible;
use warp::{ Filter, Rejection, Reply, reply };
use warp::http::StatusCode;
use time::OffsetDateTime;
use uuid::Uuid;
use domains::item::{ ItemDraft, ItemStatus };
use handlers::todo::Coordinator;
use crate::auth;
use crate::errors::{ error_reply, mutation_error };
use crate::models::DeleteQuery;

/// Function that initialises all the endpoints under the path /todos
pub fn init(
    coordinator: Coordinator,
    max_request_size: u64
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    get_all(coordinator.clone())
        .or(get_by_id(coordinator.clone()))
        .or(get_by_status(coordinator.clone()))
        .or(post(coordinator.clone(), max_request_size))
        .or(put(coordinator.clone(), max_request_size))
        .or(patch_status(coordinator.clone()))
        .or(delete(coordinator))

}


fn with_coordinator(coordinator: Coordinator) -> impl Filter<Extract = (Coordinator,), Error = Infallible> + Clone {

    warp::any().map(move || coordinator.clone())

}


/// GET /todos
fn get_all(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos")
        .and(warp::get())
        .and(auth::user())
        .and(with_coordinator(coordinator))
        .and_then(|user_id: Uuid, coordinator: Coordinator| async move {

            let items = coordinator.get_items(user_id).await;
            Ok::<_, Infallible>(reply::json(&items))

        })

}


/// GET /todos/{id}. Numeric segments are item ids.
fn get_by_id(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos" / i64)
        .and(warp::get())
        .and(auth::user())
        .and(with_coordinator(coordinator))
        .and_then(|item_id: i64, user_id: Uuid, coordinator: Coordinator| async move {

            let response = match coordinator.get_item(user_id, item_id).await {
                Some(item) => reply::json(&item).into_response(),
                None => not_found(item_id),
            };

            Ok::<_, Infallible>(response)

        })

}


/// GET /todos/{status}. Segments that don't name a status don't match.
fn get_by_status(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos" / ItemStatus)
        .and(warp::get())
        .and(auth::user())
        .and(with_coordinator(coordinator))
        .and_then(|item_status: ItemStatus, user_id: Uuid, coordinator: Coordinator| async move {

            let items = coordinator.get_items_by_status(user_id, item_status).await;
            Ok::<_, Infallible>(reply::json(&items))

        })

}


/// POST /todos
fn post(coordinator: Coordinator, max_request_size: u64) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos")
        .and(warp::post())
        .and(auth::user())
        .and(warp::body::content_length_limit(max_request_size))
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(create_item)

}


/// Check the draft and create the item it describes
async fn create_item(
    user_id: Uuid,
    draft: ItemDraft,
    coordinator: Coordinator
) -> Result<reply::Response, Infallible> {

    if let Err(errors) = draft.validate(OffsetDateTime::now_utc()) {
        return Ok(invalid(errors));
    }

    let response = match coordinator.create_item(user_id, &draft).await {

        Ok(item) => reply::with_status(reply::json(&item), StatusCode::CREATED).into_response(),

        Err(e) => mutation_error(&e, &format!("creating a to-do item for {}", user_id)),

    };

    Ok(response)

}


/// PUT /todos
fn put(coordinator: Coordinator, max_request_size: u64) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos")
        .and(warp::put())
        .and(auth::user())
        .and(warp::body::content_length_limit(max_request_size))
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(update_item)

}


/// Check the draft and replace the item it names
async fn update_item(
    user_id: Uuid,
    draft: ItemDraft,
    coordinator: Coordinator
) -> Result<reply::Response, Infallible> {

    if let Err(errors) = draft.validate_update(OffsetDateTime::now_utc()) {
        return Ok(invalid(errors));
    }

    let response = match coordinator.update_item(user_id, &draft).await {

        Ok(Some(item)) => reply::json(&item).into_response(),

        Ok(None) => not_found(draft.item_id.unwrap_or_default()),

        Err(e) => mutation_error(&e, &format!("updating a to-do item for {}", user_id)),

    };

    Ok(response)

}


/// PATCH /todos/{id}/status/{status}
fn patch_status(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos" / i64 / "status" / ItemStatus)
        .and(warp::patch())
        .and(auth::user())
        .and(with_coordinator(coordinator))
        .and_then(|item_id: i64, item_status: ItemStatus, user_id: Uuid, coordinator: Coordinator| async move {

            if item_status == ItemStatus::NotSpecified {
                return Ok::<_, Infallible>(invalid(vec!["ToDo Item Status should not be empty".to_string()]));
            }

            let response = match coordinator.patch_item_status(user_id, item_id, item_status).await {

                Ok(Some(item)) => reply::json(&item).into_response(),

                Ok(None) => not_found(item_id),

                Err(e) => mutation_error(
                    &e,
                    &format!("updating the status of a to-do item for {} to {}", user_id, item_status)
                ),

            };

            Ok(response)

        })

}


/// DELETE /todos?itemId={id}
fn delete(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {

    warp::path!("todos")
        .and(warp::delete())
        .and(auth::user())
        .and(warp::query::<DeleteQuery>())
        .and(with_coordinator(coordinator))
        .and_then(|user_id: Uuid, query: DeleteQuery, coordinator: Coordinator| async move {

            // make sure the user has included the `itemId` parameter
            let item_id = match query.item_id {
                Some(item_id) => item_id,
                None => return Ok::<_, Infallible>(error_reply(
                    StatusCode::BAD_REQUEST,
                    "The url parameter `itemId` was missing from your request.".to_string()
                )),
            };

            let response = match coordinator.delete_item(user_id, item_id).await {

                Ok(Some(_)) => StatusCode::OK.into_response(),

                Ok(None) => not_found(item_id),

                Err(e) => mutation_error(&e, &format!("deleting a to-do item for {}", user_id)),

            };

            Ok(response)

        })

}


fn not_found(item_id: i64) -> reply::Response {

    error_reply(StatusCode::NOT_FOUND, format!("To-do item by id {} cannot be found.", item_id))

}

fn invalid(errors: Vec<String>) -> reply::Response {

    error_reply(StatusCode::BAD_REQUEST, errors.join(". "))

}

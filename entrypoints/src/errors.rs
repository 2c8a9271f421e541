use std::convert::Infallible;
use std::error::Error;
use warp::{reject, reply, Rejection, Reply};
use serde_derive::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::filters::body::BodyDeserializeError;
use domains::errors::{ MutationError, PersistenceError, PublishError };
use crate::auth::Unauthorized;

/// Turn a rejection into a JSON error message
pub async fn reject_request(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {

        code = StatusCode::NOT_FOUND;
        message = String::from("Sorry, the endpoint you made a request to does not exist.");

    } else if err.find::<Unauthorized>().is_some() {

        code = StatusCode::UNAUTHORIZED;
        message = String::from("Sorry, you need to be signed in to make this request.");

    } else if let Some(e) = err.find::<BodyDeserializeError>() {

        code = StatusCode::BAD_REQUEST;
        message = body_deserialize_error(e);

    } else if err.find::<reject::InvalidQuery>().is_some() {

        code = StatusCode::BAD_REQUEST;
        message = String::from("One of the url parameters in your request had the wrong format.");

    } else if err.find::<reject::PayloadTooLarge>().is_some() {

        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = String::from("Sorry, your request body is larger than this API accepts.");

    } else if err.find::<reject::LengthRequired>().is_some() {

        code = StatusCode::LENGTH_REQUIRED;
        message = String::from("Your request needs a content-length header.");

    } else if err.find::<reject::UnsupportedMediaType>().is_some() {

        code = StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = String::from("Your request body needs to be JSON.");

    } else if err.find::<reject::MethodNotAllowed>().is_some() {

        code = StatusCode::METHOD_NOT_ALLOWED;
        message = String::from("Sorry, the HTTP method you used isn't allowed on this endpoint.");

    } else {

        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = String::from("Sorry, it looks like something unexpected went wrong so this error message can't give you any further details.");

    }

    Ok(error_reply(code, message))

}


/// Build a JSON error response
pub fn error_reply(code: StatusCode, message: String) -> reply::Response {

    let json = reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });

    reply::with_status(json, code).into_response()

}


/// Build the response for a mutation that could not be carried out.
/// `action` finishes the sentence "Something went wrong while ...".
pub fn mutation_error(error: &MutationError, action: &str) -> reply::Response {

    match error {

        MutationError::Persistence(PersistenceError::Conflict(reason)) => error_reply(
            StatusCode::CONFLICT,
            format!("Sorry, {}.", reason)
        ),

        MutationError::Persistence(PersistenceError::Invalid(reason)) => error_reply(
            StatusCode::BAD_REQUEST,
            format!("Sorry, {}.", reason)
        ),

        MutationError::Persistence(_) => error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong while {}. Please try again in a while.", action)
        ),

        // the change is kept, only the event is missing
        MutationError::Publish(e @ PublishError::Transient(_)) => error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("The change was saved but its event could not be published yet ({}). Please try again in a while.", e)
        ),

        MutationError::Publish(e @ PublishError::Fatal(_)) => error_reply(
            StatusCode::BAD_GATEWAY,
            format!("The change was saved but its event could not be published ({}).", e)
        ),

    }

}


/// When the body of a request could not be deserialized correctly, call this
/// function to generate a error message to help the user get it right next time
fn body_deserialize_error(err: &BodyDeserializeError) -> String {

    let message = match err.source() {

        Some(cause) => {

            let cause_string = cause.to_string();

            if cause_string.contains("missing field") {

                let field_name = cause_string.chars().skip(14).take(100).collect::<String>();
                format!("Your request body is missing the field: {}", field_name)

            } else if cause_string.contains("invalid type:") {

                let mut error_message_words: Vec<&str> = cause_string.rsplit(' ').collect();
                error_message_words.reverse();

                match (error_message_words.get(2), error_message_words.get(6)) {

                    (Some(request_type), Some(expected_type)) => format!(
                        "One of the fields in your request body had the wrong data type. You passed a {} while the expected type was {}.",
                        request_type,
                        expected_type
                    ),

                    _ => String::from("One of the fields in your request body had the wrong data type."),

                }

            } else if cause_string.contains("unknown variant") {

                String::from("ToDo Item Status must be one of: ['ToDo', 'InProgress', 'Completed']")

            } else {

                String::from("BAD_REQUEST")

            }

        }

        None => String::from("BAD_REQUEST"),

    };

    message

}


/// An API error response serializable to JSON.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ErrorMessage {
    code: u16,
    message: String,
}

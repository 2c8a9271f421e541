use warp::{ reject, Filter, Rejection };
use uuid::Uuid;
use log::warn;

/// The header the identity layer in front of the API puts the id of the
/// signed in user in.
pub const USER_HEADER: &str = "x-user-id";

/// The request did not say who is making it.
#[derive(Debug)]
pub struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Extract the id of the user making the request. A missing header, a
/// value that is not a UUID and the nil UUID are all refused.
pub fn user() -> impl Filter<Extract = (Uuid,), Error = Rejection> + Clone {

    warp::header::optional::<String>(USER_HEADER)
        .and_then(|header: Option<String>| async move {

            let user_id = header
                .as_deref()
                .map(str::trim)
                .and_then(|value| Uuid::parse_str(value).ok())
                .filter(|user_id| !user_id.is_nil());

            match user_id {
                Some(user_id) => Ok(user_id),
                None => {
                    warn!(target: "api", "Refused a request without a valid {} header.", USER_HEADER);
                    Err(reject::custom(Unauthorized))
                }
            }

        })

}

use warp::Filter;
use std::sync::Arc;
use handlers::publish::PublishStats;
use crate::models::HealthResponse;

/// Function that initialises the GET endpoint at the path /health
pub fn init(stats: Arc<PublishStats>) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {

    warp::path!("health")
        .and(warp::get())
        .map(move || {

            let response = HealthResponse {
                code: warp::http::StatusCode::OK.as_u16(),
                state: String::from("good"),
                published: stats.snapshot(),
            };

            warp::reply::json(&response)

        })
}

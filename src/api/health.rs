use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;

use super::error::{Result, RouteError};

async fn health(_: Request<Body>) -> Result<Response<Body>> {
    tracing::debug!("health check");
    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::from("OK"))
        .expect("failed to build health response"))
}

pub fn routes() -> Router<Body, RouteError> {
    Router::builder()
        .get("/", health)
        .build()
        .expect("failed to build health router")
}

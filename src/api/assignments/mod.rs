use std::sync::Weak;

use hyper::{Body, Request, Response, StatusCode};
use routerify::prelude::RequestExt;
use routerify::Router;
use serde_json::json;

use crate::database::assignment::{self, AssignmentInput, MutationResult};
use crate::global::GlobalState;

use super::error::{Result, ResultExt, RouteError};
use super::macros::make_response;

fn not_found() -> Response<Body> {
    make_response!(StatusCode::NOT_FOUND, json!({ "error": "Assignment not found" }))
}

// A non-numeric id can never match a row, so it is not-found without ever
// touching the store.
fn parse_id(req: &Request<Body>) -> Option<i32> {
    req.param("id").and_then(|id| id.parse().ok())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db_err| db_err.is_unique_violation())
}

fn duplicate_title() -> Response<Body> {
    make_response!(
        StatusCode::CONFLICT,
        json!({ "error": "an assignment with this title already exists" })
    )
}

async fn read_input(req: &mut Request<Body>) -> Result<AssignmentInput> {
    let body = hyper::body::to_bytes(req.body_mut())
        .await
        .extend_route((StatusCode::BAD_REQUEST, "failed to read request body"))?;

    serde_json::from_slice(&body).map_err(|_| {
        RouteError::from(make_response!(
            StatusCode::BAD_REQUEST,
            json!({ "error": "request body is not valid json" })
        ))
    })
}

async fn list_route(req: Request<Body>) -> Result<Response<Body>> {
    let global = req
        .data::<Weak<GlobalState>>()
        .and_then(Weak::upgrade)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "failed to get global state"))?;

    let assignments = assignment::list(&global.db)
        .await
        .extend_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch assignments"))?;

    Ok(make_response!(StatusCode::OK, json!(assignments)))
}

async fn create_route(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req
        .data::<Weak<GlobalState>>()
        .and_then(Weak::upgrade)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "failed to get global state"))?;

    let input = read_input(&mut req).await?;

    match assignment::insert(&global.db, &input).await {
        Ok(MutationResult::Ok(created)) => Ok(make_response!(StatusCode::OK, json!(created))),
        Ok(MutationResult::ValidationFailed(errors)) => {
            Ok(make_response!(StatusCode::BAD_REQUEST, json!(errors)))
        }
        Ok(MutationResult::NotFound) => Ok(not_found()),
        Err(err) if is_unique_violation(&err) => Ok(duplicate_title()),
        Err(err) => Err(RouteError::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to insert assignment",
            err,
        ))),
    }
}

async fn get_route(req: Request<Body>) -> Result<Response<Body>> {
    let global = req
        .data::<Weak<GlobalState>>()
        .and_then(Weak::upgrade)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "failed to get global state"))?;

    let Some(id) = parse_id(&req) else {
        return Ok(not_found());
    };

    let assignment = assignment::find_by_id(&global.db, id)
        .await
        .extend_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch assignment"))?;

    match assignment {
        Some(assignment) => Ok(make_response!(StatusCode::OK, json!(assignment))),
        None => Ok(not_found()),
    }
}

async fn patch_route(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req
        .data::<Weak<GlobalState>>()
        .and_then(Weak::upgrade)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "failed to get global state"))?;

    let Some(id) = parse_id(&req) else {
        return Ok(not_found());
    };

    let input = read_input(&mut req).await?;

    match assignment::update(&global.db, id, &input).await {
        Ok(MutationResult::Ok(updated)) => Ok(make_response!(StatusCode::OK, json!(updated))),
        Ok(MutationResult::ValidationFailed(errors)) => {
            Ok(make_response!(StatusCode::BAD_REQUEST, json!(errors)))
        }
        Ok(MutationResult::NotFound) => Ok(not_found()),
        Err(err) if is_unique_violation(&err) => Ok(duplicate_title()),
        Err(err) => Err(RouteError::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to update assignment",
            err,
        ))),
    }
}

async fn delete_route(req: Request<Body>) -> Result<Response<Body>> {
    let global = req
        .data::<Weak<GlobalState>>()
        .and_then(Weak::upgrade)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "failed to get global state"))?;

    let Some(id) = parse_id(&req) else {
        return Ok(not_found());
    };

    let deleted = assignment::delete(&global.db, id)
        .await
        .extend_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete assignment"))?;

    match deleted {
        Some(deleted) => Ok(make_response!(
            StatusCode::OK,
            json!({ "deleted": true, "id": deleted.id, "title": deleted.title })
        )),
        None => Ok(not_found()),
    }
}

pub fn routes() -> Router<Body, RouteError> {
    Router::builder()
        .get("/", list_route)
        .post("/", create_route)
        .get("/:id", get_route)
        .patch("/:id", patch_route)
        .delete("/:id", delete_route)
        .build()
        .expect("failed to build assignments router")
}

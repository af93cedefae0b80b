use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{debug, info, instrument};

use super::{dto::ShirtPayload, repo_types::Shirt};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn shirt_routes() -> Router<AppState> {
    Router::new()
        .route("/shirt/", get(list_shirts).post(create_shirt))
        .route(
            "/shirt/:id",
            get(shirt_details).put(update_shirt).delete(delete_shirt),
        )
}

fn not_found() -> ApiError {
    ApiError::NotFound("Not found.".into())
}

#[instrument(skip(state, _user))]
pub async fn list_shirts(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<Shirt>>> {
    let shirts = state.shirts.list().await?;
    debug!(count = shirts.len(), "listed shirts");
    Ok(Json(shirts))
}

#[instrument(skip(state, user, payload), fields(user = user.id))]
pub async fn create_shirt(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<ShirtPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Shirt>)> {
    let Json(payload) = payload?;
    let new = payload.into_new()?;
    let shirt = state.shirts.create(new).await?;
    info!(shirt_id = shirt.id, "shirt created");
    Ok((StatusCode::CREATED, Json(shirt)))
}

#[instrument(skip(state, _user))]
pub async fn shirt_details(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Shirt>> {
    let shirt = match id.parse::<i64>() {
        Ok(id) => state.shirts.get(id).await?,
        Err(_) => None,
    }
    .ok_or_else(not_found)?;
    Ok(Json(shirt))
}

/// A missing shirt is reported as 400 with a message here, unlike the 404 of
/// details and delete.
#[instrument(skip(state, user, payload), fields(user = user.id))]
pub async fn update_shirt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ShirtPayload>, JsonRejection>,
) -> ApiResult<Json<Shirt>> {
    let does_not_exist = || ApiError::BadRequest(format!("Shirt with id: {} does not exist", id));
    let Some(shirt_id) = id.parse::<i64>().ok() else {
        return Err(does_not_exist());
    };
    if state.shirts.get(shirt_id).await?.is_none() {
        return Err(does_not_exist());
    }

    let Json(payload) = payload?;
    let changes = payload.into_changes()?;
    let shirt = state
        .shirts
        .update(shirt_id, &changes)
        .await?
        .ok_or_else(does_not_exist)?;
    info!(shirt_id, "shirt updated");
    Ok(Json(shirt))
}

#[instrument(skip(state, user), fields(user = user.id))]
pub async fn delete_shirt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let Ok(shirt_id) = id.parse::<i64>() else {
        return Err(not_found());
    };
    if !state.shirts.delete(shirt_id).await? {
        return Err(not_found());
    }
    info!(shirt_id, "shirt deleted");
    Ok(StatusCode::NO_CONTENT)
}

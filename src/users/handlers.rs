use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, instrument};

use super::{dto::UserView, form::UserForm, services};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Profile pictures ride in the register and update bodies.
pub const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", post(register))
        .route("/users/:id/update", put(update_user))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .route("/users/list", get(list_users))
        .route("/users/:id/details", get(user_details))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    form: UserForm,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = services::register(&state, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserView::from_user(user, &state.config.media.url)),
    ))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserView>>> {
    let users = state.users.list_active().await?;
    debug!(count = users.len(), "listed users");
    let media_url = &state.config.media.url;
    Ok(Json(
        users
            .into_iter()
            .map(|u| UserView::from_user(u, media_url))
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn user_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let user = match id.parse::<i64>() {
        Ok(id) => state.users.find_active(id).await?,
        Err(_) => None,
    }
    .ok_or_else(|| ApiError::NotFound("Not found.".into()))?;
    Ok(Json(UserView::from_user(user, &state.config.media.url)))
}

/// The body is read only after the caller is known to be allowed to change
/// the account.
#[instrument(skip(state, requester, form), fields(requester = requester.id))]
pub async fn update_user(
    State(state): State<AppState>,
    requester: CurrentUser,
    Path(id): Path<String>,
    form: Result<UserForm, ApiError>,
) -> ApiResult<Json<UserView>> {
    let user = services::update(&state, &requester, &id, form).await?;
    Ok(Json(UserView::from_user(user, &state.config.media.url)))
}

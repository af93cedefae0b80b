use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AccessToken, RefreshRequest, TokenPair, TokenRequest},
        jwt::JwtKeys,
        password::{verify_password_blocking, DUMMY_HASH},
    },
    error::{ApiError, ApiResult, FieldErrors, REQUIRED},
    state::AppState,
};

pub fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
}

#[instrument(skip(state, payload))]
pub async fn obtain_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenPair>> {
    let Json(payload) = payload?;
    let (username, password) = payload.credentials()?;

    let Some(user) = state.users.find_active_by_username(&username).await? else {
        // same argon2 cost as a real account
        let _ = verify_password_blocking(password, DUMMY_HASH.to_string()).await;
        warn!(%username, "login unknown or inactive user");
        return Err(ApiError::AuthenticationFailed);
    };

    if !verify_password_blocking(password, user.password.clone()).await? {
        warn!(%username, user_id = user.id, "login invalid password");
        return Err(ApiError::AuthenticationFailed);
    }

    let keys = JwtKeys::from_ref(&state);
    let access = keys.sign_access(user.id)?;
    let refresh = keys.sign_refresh(user.id)?;

    info!(user_id = user.id, %username, "user logged in");
    Ok(Json(TokenPair { access, refresh }))
}

#[instrument(skip(state, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<AccessToken>> {
    let Json(payload) = payload?;
    let token = payload
        .refresh
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation(FieldErrors::single("refresh", REQUIRED)))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::Unauthorized("Token is invalid or expired".into())
    })?;

    let access = keys.sign_access(claims.sub)?;
    Ok(Json(AccessToken { access }))
}

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::jwt::AuthUser;
use crate::{error::ApiError, state::AppState};

/// The authenticated caller, resolved against the user store. Handlers take
/// this explicitly instead of reading a request-global identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_superuser: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;

        let user = state.users.find_active(user_id).await?.ok_or_else(|| {
            warn!(user_id, "token subject missing or inactive");
            ApiError::Unauthorized("User not found".into())
        })?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            is_superuser: user.is_superuser,
        })
    }
}

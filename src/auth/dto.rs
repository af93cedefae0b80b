use serde::{Deserialize, Serialize};

use crate::error::{ApiError, FieldErrors, REQUIRED};

/// Request body for `POST /api/token/`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl TokenRequest {
    /// Both fields must be present and non-blank.
    pub fn credentials(self) -> Result<(String, String), ApiError> {
        let mut errors = FieldErrors::new();
        let username = self.username.filter(|u| !u.trim().is_empty());
        let password = self.password.filter(|p| !p.is_empty());
        if username.is_none() {
            errors.add("username", REQUIRED);
        }
        if password.is_none() {
            errors.add("password", REQUIRED);
        }
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// Request body for `POST /api/token/refresh/`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// Response of a successful login.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response of a successful refresh.
#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

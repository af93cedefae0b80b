use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String, // argon2 hash, not exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_picture: Option<String>, // media key, relative to MEDIA_ROOT
    pub is_active: bool,
    pub is_superuser: bool,
    pub date_joined: OffsetDateTime,
}

/// Row to insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub is_superuser: bool,
}

/// Whitelisted profile changes. `None` leaves a column untouched; for the
/// picture, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<Option<String>>,
}

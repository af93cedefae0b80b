use serde::Serialize;

use super::repo_types::User;

/// Public view of an account. Never carries the password.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

impl UserView {
    pub fn from_user(user: User, media_url: &str) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            profile_picture: user
                .profile_picture
                .map(|key| format!("{}{}", media_url, key)),
        }
    }
}

/// Validated registration payload.
#[derive(Debug)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

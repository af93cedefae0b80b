use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::RegisterInput,
    form::{FormValue, UploadItem, UserForm, PICTURE_FIELD},
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    auth::{extractors::CurrentUser, password::hash_password_blocking},
    config::AdminBootstrap,
    db::StoreError,
    error::{ApiError, ApiResult, FieldErrors, REQUIRED},
    state::AppState,
    storage::ext_from_mime,
};

const USERNAME_MAX: usize = 150;
const NAME_MAX: usize = 150;
const EMAIL_MAX: usize = 254;
const PICTURE_DIR: &str = "profile-pictures";
const DUPLICATE_USERNAME: &str = "A user with that username already exists.";

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}

/// Reads an optional text field, recording a message when it is not text.
fn optional_text(form: &UserForm, field: &str, errors: &mut FieldErrors) -> Option<String> {
    match form.get(field)? {
        FormValue::Text(s) => Some(s.clone()),
        // blank is allowed for the optional profile fields
        FormValue::Null => Some(String::new()),
        FormValue::Invalid => {
            errors.add(field, "Not a valid string.");
            None
        }
    }
}

fn check_name(field: &str, value: &str, errors: &mut FieldErrors) {
    if value.chars().count() > NAME_MAX {
        errors.add(field, too_long(NAME_MAX));
    }
}

fn check_email(value: &str, errors: &mut FieldErrors) {
    if value.chars().count() > EMAIL_MAX {
        errors.add("email", too_long(EMAIL_MAX));
    }
    if !value.is_empty() && !is_valid_email(value) {
        errors.add("email", "Enter a valid email address.");
    }
}

fn check_picture(form: &UserForm, errors: &mut FieldErrors) {
    if let Some(FormValue::Text(_) | FormValue::Invalid) = form.get(PICTURE_FIELD) {
        errors.add(
            PICTURE_FIELD,
            "The submitted data was not a file. Check the encoding type on the form.",
        );
    }
    if let Some(upload) = &form.picture {
        if upload.body.is_empty() {
            errors.add(PICTURE_FIELD, "The submitted file is empty.");
        } else if ext_from_mime(&upload.content_type).is_none() {
            errors.add(
                PICTURE_FIELD,
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            );
        }
    }
}

pub fn parse_registration(form: &UserForm) -> ApiResult<RegisterInput> {
    let mut errors = FieldErrors::new();

    let username = match form.get("username") {
        Some(FormValue::Text(s)) if !s.trim().is_empty() => {
            let s = s.trim().to_string();
            if s.chars().count() > USERNAME_MAX {
                errors.add("username", too_long(USERNAME_MAX));
            }
            if !is_valid_username(&s) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
            s
        }
        Some(FormValue::Invalid) => {
            errors.add("username", "Not a valid string.");
            String::new()
        }
        _ => {
            errors.add("username", REQUIRED);
            String::new()
        }
    };

    let password = match form.get("password") {
        Some(FormValue::Text(s)) if !s.is_empty() => s.clone(),
        _ => {
            errors.add("password", REQUIRED);
            String::new()
        }
    };

    let first_name = optional_text(form, "first_name", &mut errors).unwrap_or_default();
    check_name("first_name", &first_name, &mut errors);
    let last_name = optional_text(form, "last_name", &mut errors).unwrap_or_default();
    check_name("last_name", &last_name, &mut errors);
    let email = optional_text(form, "email", &mut errors)
        .unwrap_or_default()
        .trim()
        .to_string();
    check_email(&email, &mut errors);
    check_picture(form, &mut errors);

    errors.finish(RegisterInput {
        username,
        password,
        first_name,
        last_name,
        email,
    })
}

/// Picks the updatable fields out of `form`; everything else is ignored.
/// The picture itself is stored separately, so it is left unset here unless
/// the caller asked to clear it.
pub fn parse_changes(form: &UserForm) -> ApiResult<UserChanges> {
    let mut errors = FieldErrors::new();

    let first_name = optional_text(form, "first_name", &mut errors);
    if let Some(v) = &first_name {
        check_name("first_name", v, &mut errors);
    }
    let last_name = optional_text(form, "last_name", &mut errors);
    if let Some(v) = &last_name {
        check_name("last_name", v, &mut errors);
    }
    let email = optional_text(form, "email", &mut errors).map(|e| e.trim().to_string());
    if let Some(v) = &email {
        check_email(v, &mut errors);
    }
    check_picture(form, &mut errors);

    let profile_picture = match form.get(PICTURE_FIELD) {
        Some(FormValue::Null) if form.picture.is_none() => Some(None),
        _ => None,
    };

    errors.finish(UserChanges {
        first_name,
        last_name,
        email,
        profile_picture,
    })
}

/// Only a superuser or the account owner may change an account.
pub fn authorize_update(requester: &CurrentUser, target_id: Option<i64>) -> ApiResult<()> {
    if requester.is_superuser || target_id == Some(requester.id) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Unauthorized".into()))
    }
}

async fn store_picture(state: &AppState, upload: UploadItem) -> anyhow::Result<String> {
    let ext = ext_from_mime(&upload.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", PICTURE_DIR, Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("store picture {}", key))?;
    Ok(key)
}

async fn discard_picture(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to remove picture");
    }
}

pub async fn register(state: &AppState, form: UserForm) -> ApiResult<User> {
    let input = parse_registration(&form)?;

    if state.users.username_exists(&input.username).await? {
        warn!(username = %input.username, "username already registered");
        return Err(ApiError::Validation(FieldErrors::single(
            "username",
            DUPLICATE_USERNAME,
        )));
    }

    let password_hash = hash_password_blocking(input.password).await?;
    let profile_picture = match form.picture {
        Some(upload) => Some(store_picture(state, upload).await?),
        None => None,
    };

    let created = state
        .users
        .create(NewUser {
            username: input.username,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            profile_picture: profile_picture.clone(),
            is_superuser: false,
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "user registered");
            Ok(user)
        }
        Err(e) => {
            if let Some(key) = &profile_picture {
                discard_picture(state, key).await;
            }
            Err(match e {
                StoreError::Duplicate(_) => {
                    ApiError::Validation(FieldErrors::single("username", DUPLICATE_USERNAME))
                }
                other => other.into(),
            })
        }
    }
}

pub async fn update(
    state: &AppState,
    requester: &CurrentUser,
    raw_id: &str,
    form: ApiResult<UserForm>,
) -> ApiResult<User> {
    let target_id = raw_id.parse::<i64>().ok();
    authorize_update(requester, target_id)?;

    let does_not_exist = || ApiError::BadRequest(format!("User with id: {} does not exist", raw_id));
    let current = match target_id {
        Some(id) => state.users.find_active(id).await?,
        None => None,
    }
    .ok_or_else(does_not_exist)?;

    let form = form?;
    let mut changes = parse_changes(&form)?;
    let new_picture = match form.picture {
        Some(upload) => {
            let key = store_picture(state, upload).await?;
            changes.profile_picture = Some(Some(key.clone()));
            Some(key)
        }
        None => None,
    };

    let updated = match state.users.update_profile(current.id, &changes).await {
        Ok(Some(user)) => user,
        other => {
            if let Some(key) = &new_picture {
                discard_picture(state, key).await;
            }
            return Err(match other {
                Err(e) => e.into(),
                _ => does_not_exist(),
            });
        }
    };

    if changes.profile_picture.is_some() {
        if let Some(old) = current.profile_picture.as_deref() {
            if updated.profile_picture.as_deref() != Some(old) {
                discard_picture(state, old).await;
            }
        }
    }

    info!(user_id = updated.id, by = %requester.username, "user updated");
    Ok(updated)
}

/// Creates the configured superuser unless the username is already taken.
pub async fn bootstrap_admin(state: &AppState, admin: &AdminBootstrap) -> anyhow::Result<()> {
    if state.users.username_exists(&admin.username).await? {
        info!(username = %admin.username, "bootstrap admin already present");
        return Ok(());
    }
    anyhow::ensure!(
        is_valid_username(&admin.username),
        "ADMIN_USERNAME {:?} is not a valid username",
        admin.username
    );
    let password_hash = hash_password_blocking(admin.password.clone()).await?;
    let user = state
        .users
        .create(NewUser {
            username: admin.username.clone(),
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            email: admin.email.clone(),
            profile_picture: None,
            is_superuser: true,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requester(id: i64, is_superuser: bool) -> CurrentUser {
        CurrentUser {
            id,
            username: format!("user{}", id),
            is_superuser,
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_creates_superuser_once() {
        let app = crate::testing::TestApp::new();
        let admin = AdminBootstrap {
            username: "admin".into(),
            password: "testing".into(),
            email: "admin@mail.com".into(),
        };
        bootstrap_admin(&app.state, &admin).await.unwrap();
        bootstrap_admin(&app.state, &admin).await.unwrap();

        let stored = app.users.get_by_username("admin").unwrap();
        assert!(stored.is_superuser);
        assert_eq!(stored.email, "admin@mail.com");
        assert_eq!(app.state.users.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bootstrap_admin_rejects_invalid_username() {
        let app = crate::testing::TestApp::new();
        let admin = AdminBootstrap {
            username: "bad name".into(),
            password: "testing".into(),
            email: String::new(),
        };
        assert!(bootstrap_admin(&app.state, &admin).await.is_err());
    }

    #[test]
    fn owner_and_superuser_may_update() {
        assert!(authorize_update(&requester(5, false), Some(5)).is_ok());
        assert!(authorize_update(&requester(1, true), Some(5)).is_ok());
        assert!(authorize_update(&requester(1, true), None).is_ok());
    }

    #[test]
    fn others_may_not_update() {
        let err = authorize_update(&requester(4, false), Some(5)).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Unauthorized"));
        assert!(authorize_update(&requester(4, false), None).is_err());
    }

    #[test]
    fn username_rules() {
        assert!(is_valid_username("test_user"));
        assert!(is_valid_username("a.b@c+d-e"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("semi;colon"));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user example.com"));
    }

    #[test]
    fn registration_requires_username_and_password() {
        let form = UserForm::from_json(json!({ "email": "x@y.z" })).unwrap();
        let Err(ApiError::Validation(errors)) = parse_registration(&form) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("username"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(errors.get("password"), Some(&[REQUIRED.to_string()][..]));
        assert!(errors.get("email").is_none());
    }

    #[test]
    fn registration_defaults_optional_fields() {
        let form = UserForm::from_json(json!({
            "username": "test_user",
            "password": "test_password",
        }))
        .unwrap();
        let input = parse_registration(&form).unwrap();
        assert_eq!(input.username, "test_user");
        assert_eq!(input.first_name, "");
        assert_eq!(input.email, "");
    }

    #[test]
    fn registration_rejects_bad_email_and_long_names() {
        let form = UserForm::from_json(json!({
            "username": "test_user",
            "password": "test_password",
            "email": "not-an-email",
            "last_name": "x".repeat(151),
        }))
        .unwrap();
        let Err(ApiError::Validation(errors)) = parse_registration(&form) else {
            panic!("expected validation error");
        };
        assert!(errors.get("email").is_some());
        assert!(errors.get("last_name").is_some());
    }

    #[test]
    fn registration_rejects_picture_given_as_text() {
        let form = UserForm::from_json(json!({
            "username": "test_user",
            "password": "test_password",
            "profile_picture": "/tmp/x.jpg",
        }))
        .unwrap();
        let Err(ApiError::Validation(errors)) = parse_registration(&form) else {
            panic!("expected validation error");
        };
        assert!(errors.get(PICTURE_FIELD).is_some());
    }

    #[test]
    fn changes_keep_only_whitelisted_fields() {
        let form = UserForm::from_json(json!({
            "username": "hijack",
            "password": "new",
            "is_superuser": true,
            "first_name": "New",
        }))
        .unwrap();
        let changes = parse_changes(&form).unwrap();
        assert_eq!(
            changes,
            UserChanges {
                first_name: Some("New".into()),
                ..UserChanges::default()
            }
        );
    }

    #[test]
    fn null_picture_clears_it() {
        let form = UserForm::from_json(json!({ "profile_picture": null })).unwrap();
        let changes = parse_changes(&form).unwrap();
        assert_eq!(changes.profile_picture, Some(None));
    }

    #[test]
    fn rejects_non_image_upload() {
        let mut form = UserForm::default();
        form.picture = Some(UploadItem {
            body: bytes::Bytes::from_static(b"plain"),
            content_type: "text/plain".into(),
        });
        let Err(ApiError::Validation(errors)) = parse_changes(&form) else {
            panic!("expected validation error");
        };
        assert!(errors.get(PICTURE_FIELD).is_some());
    }
}

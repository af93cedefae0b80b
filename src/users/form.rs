//! Account payloads arrive either as JSON or as `multipart/form-data`; the
//! latter is the only way to attach a profile picture.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use bytes::Bytes;
use serde_json::Value;

use crate::error::ApiError;

pub const PICTURE_FIELD: &str = "profile_picture";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Null,
    /// Present but not representable as text (arrays, objects, booleans).
    Invalid,
}

#[derive(Debug)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct UserForm {
    fields: HashMap<String, FormValue>,
    pub picture: Option<UploadItem>,
}

impl UserForm {
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.get(name)
    }

    pub fn from_json(value: Value) -> Result<Self, ApiError> {
        let Value::Object(map) = value else {
            return Err(ApiError::BadRequest(
                "Invalid data. Expected a dictionary.".into(),
            ));
        };
        let fields = map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => FormValue::Text(s),
                    Value::Number(n) => FormValue::Text(n.to_string()),
                    Value::Null => FormValue::Null,
                    _ => FormValue::Invalid,
                };
                (k, v)
            })
            .collect();
        Ok(Self {
            fields,
            picture: None,
        })
    }

    async fn from_multipart(mut mp: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = mp.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == PICTURE_FIELD && field.file_name().is_some() {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await?;
                form.picture = Some(UploadItem { body, content_type });
                continue;
            }
            let text = field.text().await?;
            // an empty picture part in a form means "no file"
            let value = if name == PICTURE_FIELD && text.is_empty() {
                FormValue::Null
            } else {
                FormValue::Text(text)
            };
            form.fields.insert(name, value);
        }
        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for UserForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
            Self::from_multipart(mp).await
        } else {
            let Json(value) = Json::<Value>::from_request(req, state).await?;
            Self::from_json(value)
        }
    }
}

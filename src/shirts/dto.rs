use serde::Deserialize;
use serde_json::Value;

use super::repo_types::{NewShirt, ShirtChanges};
use crate::error::{ApiError, ApiResult, FieldErrors, REQUIRED};

const TEXT_MAX: usize = 255;

/// Raw shirt body. Fields stay untyped so every problem can be reported per
/// field instead of failing the whole body on the first type mismatch.
#[derive(Debug, Default, Deserialize)]
pub struct ShirtPayload {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub size: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)` so it is not mistaken for
/// an absent field.
fn present<'de, D>(de: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(de).map(Some)
}

fn text(field: &str, value: &Value, errors: &mut FieldErrors) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => {
            errors.add(field, "This field may not be null.");
            return None;
        }
        _ => {
            errors.add(field, "Not a valid string.");
            return None;
        }
    };
    if s.is_empty() {
        errors.add(field, "This field may not be blank.");
        return None;
    }
    if s.chars().count() > TEXT_MAX {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", TEXT_MAX),
        );
        return None;
    }
    Some(s)
}

/// Accepts JSON integers, integral floats and strings holding an integer.
fn integer(field: &str, value: &Value, errors: &mut FieldErrors) -> Option<i32> {
    let parsed = match value {
        Value::Null => {
            errors.add(field, "This field may not be null.");
            return None;
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            // "20.", "20.0" and "20.000" all mean 20
            let s = match s.split_once('.') {
                Some((whole, zeros)) if zeros.bytes().all(|b| b == b'0') => whole,
                _ => s,
            };
            s.parse::<i64>().ok()
        }
        _ => None,
    };
    match parsed.map(i32::try_from) {
        Some(Ok(v)) => Some(v),
        Some(Err(_)) => {
            errors.add(field, "Ensure this value is within the 32-bit integer range.");
            None
        }
        None => {
            errors.add(field, "A valid integer is required.");
            None
        }
    }
}

impl ShirtPayload {
    pub fn into_new(self) -> ApiResult<NewShirt> {
        let mut errors = FieldErrors::new();
        for (field, value) in [("name", &self.name), ("email", &self.email), ("size", &self.size)] {
            if value.is_none() {
                errors.add(field, REQUIRED);
            }
        }

        let changes = self.validate(&mut errors);
        match (changes.name, changes.email, changes.size) {
            (Some(name), Some(email), Some(size)) if errors.is_empty() => {
                Ok(NewShirt { name, email, size })
            }
            _ => Err(ApiError::Validation(errors)),
        }
    }

    pub fn into_changes(self) -> ApiResult<ShirtChanges> {
        let mut errors = FieldErrors::new();
        let changes = self.validate(&mut errors);
        errors.finish(changes)
    }

    fn validate(&self, errors: &mut FieldErrors) -> ShirtChanges {
        ShirtChanges {
            name: self.name.as_ref().and_then(|v| text("name", v, errors)),
            email: self.email.as_ref().and_then(|v| text("email", v, errors)),
            size: self.size.as_ref().and_then(|v| integer("size", v, errors)),
        }
    }
}

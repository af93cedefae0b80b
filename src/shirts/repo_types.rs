use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Shirt order record; serialized as-is in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Shirt {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShirt {
    pub name: String,
    pub email: String,
    pub size: i32,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShirtChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub size: Option<i32>,
}

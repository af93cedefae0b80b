use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewShirt, Shirt, ShirtChanges};
use crate::db::StoreResult;

#[async_trait]
pub trait ShirtStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Shirt>>;
    async fn get(&self, id: i64) -> StoreResult<Option<Shirt>>;
    async fn create(&self, new: NewShirt) -> StoreResult<Shirt>;
    async fn update(&self, id: i64, changes: &ShirtChanges) -> StoreResult<Option<Shirt>>;
    /// `false` when there was no such row.
    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

pub struct PgShirtStore {
    db: PgPool,
}

impl PgShirtStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ShirtStore for PgShirtStore {
    async fn list(&self) -> StoreResult<Vec<Shirt>> {
        let rows = sqlx::query_as::<_, Shirt>("SELECT id, name, email, size FROM shirts ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Shirt>> {
        let shirt =
            sqlx::query_as::<_, Shirt>("SELECT id, name, email, size FROM shirts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(shirt)
    }

    async fn create(&self, new: NewShirt) -> StoreResult<Shirt> {
        let shirt = sqlx::query_as::<_, Shirt>(
            r#"
            INSERT INTO shirts (name, email, size)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, size
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.size)
        .fetch_one(&self.db)
        .await?;
        Ok(shirt)
    }

    async fn update(&self, id: i64, changes: &ShirtChanges) -> StoreResult<Option<Shirt>> {
        let shirt = sqlx::query_as::<_, Shirt>(
            r#"
            UPDATE shirts
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   size = COALESCE($4, size)
             WHERE id = $1
            RETURNING id, name, email, size
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.size)
        .fetch_optional(&self.db)
        .await?;
        Ok(shirt)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM shirts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

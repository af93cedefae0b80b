use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewUser, User, UserChanges};
use crate::db::{map_unique, StoreResult};

const USER_COLUMNS: &str = "id, username, password, first_name, last_name, email, \
                            profile_picture, is_active, is_superuser, date_joined";

#[async_trait]
pub trait UserStore: Send + Sync {
    /// All active users in id order.
    async fn list_active(&self) -> StoreResult<Vec<User>>;
    async fn find_active(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_active_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Checks every account, active or not.
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;
    async fn create(&self, new: NewUser) -> StoreResult<User>;
    /// Applies `changes` to an active user; `None` when there is no such user.
    async fn update_profile(&self, id: i64, changes: &UserChanges) -> StoreResult<Option<User>>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_active(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_active(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_active_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND is_active"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password, first_name, last_name, email,
                               profile_picture, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.profile_picture)
        .bind(new.is_superuser)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "username"))
    }

    async fn update_profile(&self, id: i64, changes: &UserChanges) -> StoreResult<Option<User>> {
        let (set_picture, picture) = match &changes.profile_picture {
            Some(p) => (true, p.clone()),
            None => (false, None),
        };
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   email = COALESCE($4, email),
                   profile_picture = CASE WHEN $5 THEN $6 ELSE profile_picture END
             WHERE id = $1 AND is_active
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(set_picture)
        .bind(picture)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

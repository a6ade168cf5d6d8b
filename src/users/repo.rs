use axum::async_trait;

use crate::db::{ObjectId, PgStore, StoreError};
use crate::users::repo_types::{NewUser, User, UserPatch, UserRow};

/// User collection of the document store.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Validates and applies `patch`; `None` when the user does not exist.
    async fn update(&self, id: &ObjectId, patch: UserPatch) -> Result<Option<User>, StoreError>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, about, avatar, created_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, about, avatar, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, about, avatar, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        user.check()?;
        let user = user.into_user(ObjectId::new());
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, password_hash, name, about, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, name, about, avatar, created_at
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.about)
        .bind(&user.avatar)
        .fetch_one(&self.pool)
        .await?;
        User::try_from(row)
    }

    async fn update(&self, id: &ObjectId, patch: UserPatch) -> Result<Option<User>, StoreError> {
        patch.check()?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   about = COALESCE($3, about),
                   avatar = COALESCE($4, avatar)
             WHERE id = $1
            RETURNING id, email, password_hash, name, about, avatar, created_at
            "#,
        )
        .bind(id.as_str())
        .bind(patch.name)
        .bind(patch.about)
        .bind(patch.avatar)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }
}

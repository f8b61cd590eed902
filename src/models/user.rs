use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip)]
    pub access_token_hash: Option<Vec<u8>>, // SHA-256 of the access token
    pub is_super_admin: bool,
    pub is_system: bool, // actor of automated transitions, cannot log in
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserData {
    pub email: String,
    pub display_name: String,
    pub access_token_hash: Vec<u8>,
    pub is_super_admin: bool,
}

impl User {
    pub async fn create(pool: &PgPool, data: CreateUserData) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (email, display_name, access_token_hash, is_super_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.display_name)
        .bind(&data.access_token_hash)
        .bind(data.is_super_admin)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Returns the system user, creating it on first start
    pub async fn ensure_system_user(pool: &PgPool, email: &str) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (email, display_name, is_system)
            VALUES ($1, 'System', TRUE)
            ON CONFLICT (email) DO UPDATE
            SET is_system = TRUE, access_token_hash = NULL, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Creates or refreshes the configured super admin
    pub async fn upsert_super_admin(
        pool: &PgPool,
        email: &str,
        access_token_hash: &[u8],
    ) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (email, display_name, access_token_hash, is_super_admin)
            VALUES ($1, 'Administrator', $2, TRUE)
            ON CONFLICT (email) DO UPDATE
            SET access_token_hash = EXCLUDED.access_token_hash,
                is_super_admin = TRUE,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(access_token_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }
}

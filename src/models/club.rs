use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::club_user::{ClubRole, ClubUser};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClubData {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClubData {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl Club {
    /// Creates a club and registers `owner_id` as its first OWNER
    pub async fn create_with_owner(
        pool: &PgPool,
        data: &CreateClubData,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let club = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO clubs (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .fetch_one(&mut *tx)
        .await?;

        ClubUser::insert(&mut *tx, club.id, owner_id, ClubRole::Owner).await?;

        tx.commit().await?;

        Ok(club)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let club = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM clubs WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(club)
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let clubs = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM clubs ORDER BY name
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(clubs)
    }

    /// Clubs the user has a role in
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let clubs = sqlx::query_as::<_, Self>(
            r#"
            SELECT c.* FROM clubs c
            JOIN club_users cu ON cu.club_id = c.id
            WHERE cu.user_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(clubs)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &UpdateClubData,
    ) -> Result<Option<Self>, sqlx::Error> {
        let club = sqlx::query_as::<_, Self>(
            r#"
            UPDATE clubs
            SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .fetch_optional(pool)
        .await?;

        Ok(club)
    }

    /// Deletes the club and, through cascades, everything scoped to it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM clubs WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Household {
    pub id: Uuid,
    pub club_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HouseholdData {
    pub name: String,
    pub address: Option<String>,
}

impl Household {
    pub async fn create(
        pool: &PgPool,
        club_id: Uuid,
        data: &HouseholdData,
    ) -> Result<Self, sqlx::Error> {
        let household = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO households (club_id, name, address)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(club_id)
        .bind(&data.name)
        .bind(&data.address)
        .fetch_one(pool)
        .await?;

        Ok(household)
    }

    pub async fn find_in_club(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let household = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM households WHERE id = $1 AND club_id = $2
            "#,
        )
        .bind(id)
        .bind(club_id)
        .fetch_optional(pool)
        .await?;

        Ok(household)
    }

    pub async fn list_by_club(pool: &PgPool, club_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let households = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM households WHERE club_id = $1 ORDER BY name
            "#,
        )
        .bind(club_id)
        .fetch_all(pool)
        .await?;

        Ok(households)
    }

    pub async fn update(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
        name: Option<String>,
        address: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let household = sqlx::query_as::<_, Self>(
            r#"
            UPDATE households
            SET
                name = COALESCE($3, name),
                address = COALESCE($4, address),
                updated_at = NOW()
            WHERE id = $1 AND club_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(club_id)
        .bind(name)
        .bind(address)
        .fetch_optional(pool)
        .await?;

        Ok(household)
    }

    /// Members of a deleted household stay, with `household_id` cleared
    pub async fn delete(pool: &PgPool, club_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM households WHERE id = $1 AND club_id = $2
            "#,
        )
        .bind(id)
        .bind(club_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

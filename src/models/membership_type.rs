use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipType {
    pub id: Uuid,
    pub club_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub probation_days: Option<i32>, // None: probation has no automatic end
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMembershipTypeData {
    pub name: String,
    pub description: Option<String>,
    pub probation_days: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMembershipTypeData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub probation_days: Option<i32>,
    pub is_active: Option<bool>,
}

impl MembershipType {
    pub async fn create(
        pool: &PgPool,
        club_id: Uuid,
        data: &CreateMembershipTypeData,
    ) -> Result<Self, sqlx::Error> {
        let membership_type = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO membership_types (club_id, name, description, probation_days)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(club_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.probation_days)
        .fetch_one(pool)
        .await?;

        Ok(membership_type)
    }

    pub async fn find_in_club(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership_type = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM membership_types WHERE id = $1 AND club_id = $2
            "#,
        )
        .bind(id)
        .bind(club_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership_type)
    }

    /// Same lookup as [`find_in_club`](Self::find_in_club) inside a transaction
    pub async fn find_in_club_tx(
        conn: &mut PgConnection,
        club_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership_type = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM membership_types WHERE id = $1 AND club_id = $2
            "#,
        )
        .bind(id)
        .bind(club_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(membership_type)
    }

    pub async fn list_by_club(
        pool: &PgPool,
        club_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let types = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM membership_types
            WHERE club_id = $1 AND (is_active = TRUE OR $2 = FALSE)
            ORDER BY name
            "#,
        )
        .bind(club_id)
        .bind(active_only)
        .fetch_all(pool)
        .await?;

        Ok(types)
    }

    pub async fn update(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
        data: &UpdateMembershipTypeData,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership_type = sqlx::query_as::<_, Self>(
            r#"
            UPDATE membership_types
            SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                probation_days = COALESCE($5, probation_days),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1 AND club_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(club_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.probation_days)
        .bind(data.is_active)
        .fetch_optional(pool)
        .await?;

        Ok(membership_type)
    }

    /// Fails with a foreign key violation while members, periods or audit rows
    /// still reference the type
    pub async fn delete(pool: &PgPool, club_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM membership_types WHERE id = $1 AND club_id = $2
            "#,
        )
        .bind(id)
        .bind(club_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Half-open date range `[start_date, end_date)` during which a member held a
/// membership type. `end_date = NULL` marks the single open period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipPeriod {
    pub id: Uuid,
    pub member_id: Uuid,
    pub membership_type_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipPeriod {
    /// Open period of a member, locked for the rest of the transaction
    pub async fn lock_open_for_member(
        conn: &mut PgConnection,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let period = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM membership_periods
            WHERE member_id = $1 AND end_date IS NULL
            FOR UPDATE
            "#,
        )
        .bind(member_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(period)
    }

    pub async fn open(
        conn: &mut PgConnection,
        member_id: Uuid,
        membership_type_id: Uuid,
        start_date: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        let period = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO membership_periods (member_id, membership_type_id, start_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(member_id)
        .bind(membership_type_id)
        .bind(start_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(period)
    }

    pub async fn close(
        conn: &mut PgConnection,
        id: Uuid,
        end_date: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        let period = sqlx::query_as::<_, Self>(
            r#"
            UPDATE membership_periods
            SET end_date = $2, updated_at = NOW()
            WHERE id = $1 AND end_date IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(end_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(period)
    }

    pub async fn list_by_member(pool: &PgPool, member_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let periods = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM membership_periods
            WHERE member_id = $1
            ORDER BY start_date ASC, created_at ASC
            "#,
        )
        .bind(member_id)
        .fetch_all(pool)
        .await?;

        Ok(periods)
    }
}

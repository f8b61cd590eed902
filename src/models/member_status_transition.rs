use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::member::MemberStatus;

/// Append-only audit record of a status change. The table rejects updates and
/// deletes, so this type only exposes inserts and reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberStatusTransition {
    pub id: Uuid,
    pub member_id: Uuid,
    pub club_id: Uuid,
    pub from_status: Option<MemberStatus>, // None for the creation record
    pub to_status: MemberStatus,
    pub from_membership_type_id: Option<Uuid>,
    pub to_membership_type_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub reason: Option<String>,
    pub actor_user_id: Uuid,
    pub is_automatic: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTransitionData {
    pub member_id: Uuid,
    pub club_id: Uuid,
    pub from_status: Option<MemberStatus>,
    pub to_status: MemberStatus,
    pub from_membership_type_id: Option<Uuid>,
    pub to_membership_type_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub reason: Option<String>,
    pub actor_user_id: Uuid,
    pub is_automatic: bool,
}

impl MemberStatusTransition {
    pub async fn record(
        conn: &mut PgConnection,
        data: &CreateTransitionData,
    ) -> Result<Self, sqlx::Error> {
        let transition = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO member_status_transitions (
                member_id, club_id, from_status, to_status,
                from_membership_type_id, to_membership_type_id,
                effective_date, reason, actor_user_id, is_automatic
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(data.member_id)
        .bind(data.club_id)
        .bind(data.from_status)
        .bind(data.to_status)
        .bind(data.from_membership_type_id)
        .bind(data.to_membership_type_id)
        .bind(data.effective_date)
        .bind(&data.reason)
        .bind(data.actor_user_id)
        .bind(data.is_automatic)
        .fetch_one(&mut *conn)
        .await?;

        Ok(transition)
    }

    /// Latest effective date of a status change. The creation record only
    /// stamps when the member was entered, so it does not count.
    pub async fn last_effective_date(
        conn: &mut PgConnection,
        member_id: Uuid,
    ) -> Result<Option<NaiveDate>, sqlx::Error> {
        let date = sqlx::query_scalar::<_, Option<NaiveDate>>(
            r#"
            SELECT MAX(effective_date) FROM member_status_transitions
            WHERE member_id = $1 AND from_status IS NOT NULL
            "#,
        )
        .bind(member_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(date)
    }

    pub async fn list_by_member(pool: &PgPool, member_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let transitions = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM member_status_transitions
            WHERE member_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(member_id)
        .fetch_all(pool)
        .await?;

        Ok(transitions)
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Pending,
    Probation,
    Active,
    Dormant,
    Suspended,
    Left,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 6] = [
        MemberStatus::Pending,
        MemberStatus::Probation,
        MemberStatus::Active,
        MemberStatus::Dormant,
        MemberStatus::Suspended,
        MemberStatus::Left,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "PENDING",
            MemberStatus::Probation => "PROBATION",
            MemberStatus::Active => "ACTIVE",
            MemberStatus::Dormant => "DORMANT",
            MemberStatus::Suspended => "SUSPENDED",
            MemberStatus::Left => "LEFT",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: Uuid,
    pub club_id: Uuid,
    pub household_id: Option<Uuid>,
    pub membership_type_id: Option<Uuid>,
    pub member_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub status: MemberStatus,
    pub joined_on: Option<NaiveDate>,
    pub probation_ends_on: Option<NaiveDate>,
    pub scheduled_leave_on: Option<NaiveDate>,
    pub left_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMemberData {
    pub household_id: Option<Uuid>,
    pub member_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Partial update. For nullable columns an absent field keeps the stored
/// value and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMemberData {
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub member_number: Option<Option<String>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
}

/// Contact columns as written by `update_details`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDetails {
    pub member_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl UpdateMemberData {
    pub fn merge_into(&self, member: &Member) -> MemberDetails {
        MemberDetails {
            member_number: self
                .member_number
                .clone()
                .unwrap_or_else(|| member.member_number.clone()),
            first_name: self
                .first_name
                .clone()
                .unwrap_or_else(|| member.first_name.clone()),
            last_name: self
                .last_name
                .clone()
                .unwrap_or_else(|| member.last_name.clone()),
            email: self.email.clone().unwrap_or_else(|| member.email.clone()),
            phone: self.phone.clone().unwrap_or_else(|| member.phone.clone()),
            birth_date: self.birth_date.unwrap_or(member.birth_date),
        }
    }
}

/// Lifecycle columns written as one unit by a status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFields {
    pub status: MemberStatus,
    pub membership_type_id: Option<Uuid>,
    pub joined_on: Option<NaiveDate>,
    pub probation_ends_on: Option<NaiveDate>,
    pub scheduled_leave_on: Option<NaiveDate>,
    pub left_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    pub household_id: Option<Uuid>,
}

impl Member {
    /// Inserts a new PENDING member
    pub async fn create(
        conn: &mut PgConnection,
        club_id: Uuid,
        data: &CreateMemberData,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO members (
                club_id, household_id, member_number, first_name, last_name,
                email, phone, birth_date, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'PENDING')
            RETURNING *
            "#,
        )
        .bind(club_id)
        .bind(data.household_id)
        .bind(&data.member_number)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(data.birth_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(member)
    }

    /// Finds a member, scoped to its club
    pub async fn find_in_club(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM members WHERE id = $1 AND club_id = $2
            "#,
        )
        .bind(id)
        .bind(club_id)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Loads a member and holds its row lock until the transaction ends
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM members WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(member)
    }

    pub async fn list(
        pool: &PgPool,
        club_id: Uuid,
        filter: &MemberFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM members
            WHERE club_id = $1
              AND ($2::member_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR household_id = $3)
            ORDER BY last_name, first_name
            "#,
        )
        .bind(club_id)
        .bind(filter.status)
        .bind(filter.household_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Updates contact details; lifecycle columns are only written by transitions
    pub async fn update_details(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
        data: &UpdateMemberData,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let current = match Self::lock_for_update(&mut *tx, id).await? {
            Some(member) if member.club_id == club_id => member,
            _ => return Ok(None),
        };
        let details = data.merge_into(&current);

        let member = sqlx::query_as::<_, Self>(
            r#"
            UPDATE members
            SET
                member_number = $2,
                first_name = $3,
                last_name = $4,
                email = $5,
                phone = $6,
                birth_date = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&details.member_number)
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(&details.email)
        .bind(&details.phone)
        .bind(details.birth_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(member))
    }

    pub async fn set_household(
        pool: &PgPool,
        club_id: Uuid,
        id: Uuid,
        household_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            UPDATE members
            SET household_id = $3, updated_at = NOW()
            WHERE id = $1 AND club_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(club_id)
        .bind(household_id)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    pub async fn apply_status_fields(
        conn: &mut PgConnection,
        id: Uuid,
        fields: &StatusFields,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            UPDATE members
            SET
                status = $2,
                membership_type_id = $3,
                joined_on = $4,
                probation_ends_on = $5,
                scheduled_leave_on = $6,
                left_on = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fields.status)
        .bind(fields.membership_type_id)
        .bind(fields.joined_on)
        .bind(fields.probation_ends_on)
        .bind(fields.scheduled_leave_on)
        .bind(fields.left_on)
        .fetch_one(&mut *conn)
        .await?;

        Ok(member)
    }

    pub async fn set_scheduled_leave(
        conn: &mut PgConnection,
        id: Uuid,
        scheduled_leave_on: Option<NaiveDate>,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, Self>(
            r#"
            UPDATE members
            SET scheduled_leave_on = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scheduled_leave_on)
        .fetch_one(&mut *conn)
        .await?;

        Ok(member)
    }

    /// Deletes a member that never got past PENDING. Returns whether a row was removed.
    pub async fn delete_pending(pool: &PgPool, club_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM members
            WHERE id = $1 AND club_id = $2 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(club_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Members whose probation ended on or before `today`, in
    /// `(probation_ends_on, id)` order, starting after the `after` key
    pub async fn find_probation_due(
        pool: &PgPool,
        today: NaiveDate,
        after: Option<(NaiveDate, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM members
            WHERE status = 'PROBATION'
              AND probation_ends_on IS NOT NULL
              AND probation_ends_on <= $1
              AND ($2::date IS NULL OR (probation_ends_on, id) > ($2, $3::uuid))
            ORDER BY probation_ends_on ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(today)
        .bind(after.map(|(date, _)| date))
        .bind(after.map(|(_, id)| id))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Members with a departure scheduled on or before `today`, in
    /// `(scheduled_leave_on, id)` order, starting after the `after` key
    pub async fn find_leave_due(
        pool: &PgPool,
        today: NaiveDate,
        after: Option<(NaiveDate, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM members
            WHERE status <> 'LEFT'
              AND scheduled_leave_on IS NOT NULL
              AND scheduled_leave_on <= $1
              AND ($2::date IS NULL OR (scheduled_leave_on, id) > ($2, $3::uuid))
            ORDER BY scheduled_leave_on ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(today)
        .bind(after.map(|(date, _)| date))
        .bind(after.map(|(_, id)| id))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }
}

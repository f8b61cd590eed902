use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "club_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClubRole {
    Owner,
    Admin,
    MemberManager,
    Viewer,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClubUser {
    pub id: Uuid,
    pub club_id: Uuid,
    pub user_id: Uuid,
    pub role: ClubRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Club role joined with the account it belongs to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClubUserEntry {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: ClubRole,
    pub created_at: DateTime<Utc>,
}

/// Role row being changed, with the club's owner count read under the same lock
#[derive(Debug, Clone)]
pub struct LockedRole {
    pub club_user: ClubUser,
    pub owner_count: i64,
}

impl LockedRole {
    fn from_rows(rows: Vec<ClubUser>, user_id: Uuid) -> Option<Self> {
        let owner_count = rows.iter().filter(|r| r.role == ClubRole::Owner).count() as i64;
        let club_user = rows.into_iter().find(|r| r.user_id == user_id)?;

        Some(Self {
            club_user,
            owner_count,
        })
    }
}

impl ClubUser {
    pub async fn insert(
        conn: &mut PgConnection,
        club_id: Uuid,
        user_id: Uuid,
        role: ClubRole,
    ) -> Result<Self, sqlx::Error> {
        let club_user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO club_users (club_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut *conn)
        .await?;

        Ok(club_user)
    }

    pub async fn find_role(
        pool: &PgPool,
        club_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ClubRole>, sqlx::Error> {
        let role = sqlx::query_scalar::<_, ClubRole>(
            r#"
            SELECT role FROM club_users WHERE club_id = $1 AND user_id = $2
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Locks the target's role row together with every owner row of the club.
    ///
    /// One statement ordered by id, so concurrent role changes in the same club
    /// always acquire their row locks in the same order.
    pub async fn lock_for_role_change(
        conn: &mut PgConnection,
        club_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<LockedRole>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM club_users
            WHERE club_id = $1 AND (role = 'OWNER' OR user_id = $2)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(LockedRole::from_rows(rows, user_id))
    }

    pub async fn set_role(
        conn: &mut PgConnection,
        id: Uuid,
        role: ClubRole,
    ) -> Result<Self, sqlx::Error> {
        let club_user = sqlx::query_as::<_, Self>(
            r#"
            UPDATE club_users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_one(&mut *conn)
        .await?;

        Ok(club_user)
    }

    pub async fn remove(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM club_users WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn list_by_club(
        pool: &PgPool,
        club_id: Uuid,
    ) -> Result<Vec<ClubUserEntry>, sqlx::Error> {
        let entries = sqlx::query_as::<_, ClubUserEntry>(
            r#"
            SELECT cu.user_id, u.email, u.display_name, cu.role, cu.created_at
            FROM club_users cu
            JOIN users u ON u.id = cu.user_id
            WHERE cu.club_id = $1
            ORDER BY u.display_name
            "#,
        )
        .bind(club_id)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }
}

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{club_user::ClubRole, ClubUser, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewClub,
    ManageClub,
    DeleteClub,
    ManageClubUsers,
    ViewMembers,
    ManageMembers,
    ChangeMemberStatus,
    ManageMembershipTypes,
    ManageHouseholds,
}

impl ClubRole {
    pub fn grants(&self, permission: Permission) -> bool {
        use Permission::*;

        match self {
            ClubRole::Owner => true,
            ClubRole::Admin => permission != DeleteClub,
            ClubRole::MemberManager => matches!(
                permission,
                ViewClub | ViewMembers | ManageMembers | ChangeMemberStatus | ManageHouseholds
            ),
            ClubRole::Viewer => matches!(permission, ViewClub | ViewMembers),
        }
    }
}

/// Resolved access of a user to one club
#[derive(Debug, Clone, Copy)]
pub struct ClubAccess {
    pub club_id: Uuid,
    pub role: Option<ClubRole>, // None for super admins without a role in the club
    pub is_super_admin: bool,
}

impl ClubAccess {
    pub fn allows(&self, permission: Permission) -> bool {
        self.is_super_admin || self.role.map_or(false, |role| role.grants(permission))
    }

    pub fn is_owner(&self) -> bool {
        self.is_super_admin || self.role == Some(ClubRole::Owner)
    }
}

/// Checks that `user` holds `permission` in `club_id`.
///
/// Users without any role in the club get `NotFound` so club ids of other
/// tenants are not disclosed; users with a role but missing the permission
/// get `Forbidden`.
pub async fn require(
    pool: &PgPool,
    user: &User,
    club_id: Uuid,
    permission: Permission,
) -> Result<ClubAccess> {
    let role = ClubUser::find_role(pool, club_id, user.id).await?;
    let access = ClubAccess {
        club_id,
        role,
        is_super_admin: user.is_super_admin,
    };

    check(&access, permission)?;

    Ok(access)
}

pub fn check(access: &ClubAccess, permission: Permission) -> Result<()> {
    if access.role.is_none() && !access.is_super_admin {
        return Err(AppError::not_found("Club"));
    }
    if !access.allows(permission) {
        tracing::debug!(
            club_id = %access.club_id,
            ?permission,
            role = ?access.role,
            "Permission denied"
        );
        return Err(AppError::Forbidden);
    }

    Ok(())
}

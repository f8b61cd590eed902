use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    club_user::{ClubRole, ClubUserEntry, LockedRole},
    ClubUser, User,
};
use crate::services::permissions::{self, ClubAccess, Permission};

#[derive(Debug, Deserialize)]
struct AddClubUserRequest {
    email: String,
    role: ClubRole,
}

#[derive(Debug, Deserialize)]
struct UpdateRoleRequest {
    role: ClubRole,
}

/// Owner rules for changing (`Some`) or removing (`None`) a role: only owners
/// touch OWNER roles, and a club never loses its last owner.
fn check_role_change(
    access: &ClubAccess,
    current: ClubRole,
    new: Option<ClubRole>,
    owner_count: i64,
) -> Result<()> {
    let touches_owner = current == ClubRole::Owner || new == Some(ClubRole::Owner);
    if touches_owner && !access.is_owner() {
        return Err(AppError::Forbidden);
    }

    let loses_owner = current == ClubRole::Owner && new != Some(ClubRole::Owner);
    if loses_owner && owner_count <= 1 {
        return Err(AppError::Conflict(
            "A club must keep at least one owner".to_string(),
        ));
    }

    Ok(())
}

async fn list_club_users(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
) -> Result<Json<Vec<ClubUserEntry>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewClub).await?;

    Ok(Json(ClubUser::list_by_club(&state.pool, club_id).await?))
}

async fn add_club_user(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Json(body): Json<AddClubUserRequest>,
) -> Result<(StatusCode, Json<ClubUser>)> {
    let actor = get_authenticated_user(&state.pool, &session).await?;
    let access =
        permissions::require(&state.pool, &actor, club_id, Permission::ManageClubUsers).await?;

    if body.role == ClubRole::Owner && !access.is_owner() {
        return Err(AppError::Forbidden);
    }

    let target = User::find_by_email(&state.pool, body.email.trim())
        .await?
        .filter(|u| !u.is_system)
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut conn = state.pool.acquire().await?;
    let club_user = ClubUser::insert(&mut *conn, club_id, target.id, body.role).await?;

    tracing::info!(
        club_id = %club_id,
        user_id = %target.id,
        role = ?body.role,
        "Added user to club"
    );

    Ok((StatusCode::CREATED, Json(club_user)))
}

async fn update_club_user(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<ClubUser>> {
    let actor = get_authenticated_user(&state.pool, &session).await?;
    let access =
        permissions::require(&state.pool, &actor, club_id, Permission::ManageClubUsers).await?;

    let mut tx = state.pool.begin().await?;

    let LockedRole {
        club_user,
        owner_count,
    } = ClubUser::lock_for_role_change(&mut *tx, club_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Club user"))?;

    check_role_change(&access, club_user.role, Some(body.role), owner_count)?;

    let updated = ClubUser::set_role(&mut *tx, club_user.id, body.role).await?;
    tx.commit().await?;

    tracing::info!(
        club_id = %club_id,
        user_id = %user_id,
        from = ?club_user.role,
        to = ?body.role,
        "Changed club role"
    );

    Ok(Json(updated))
}

async fn remove_club_user(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let actor = get_authenticated_user(&state.pool, &session).await?;
    let access =
        permissions::require(&state.pool, &actor, club_id, Permission::ManageClubUsers).await?;

    let mut tx = state.pool.begin().await?;

    let LockedRole {
        club_user,
        owner_count,
    } = ClubUser::lock_for_role_change(&mut *tx, club_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Club user"))?;

    check_role_change(&access, club_user.role, None, owner_count)?;

    ClubUser::remove(&mut *tx, club_user.id).await?;
    tx.commit().await?;

    tracing::info!(club_id = %club_id, user_id = %user_id, "Removed user from club");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/clubs/:club_id/users",
            get(list_club_users).post(add_club_user),
        )
        .route(
            "/clubs/:club_id/users/:user_id",
            patch(update_club_user).delete(remove_club_user),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(role: ClubRole) -> ClubAccess {
        ClubAccess {
            club_id: Uuid::new_v4(),
            role: Some(role),
            is_super_admin: false,
        }
    }

    #[test]
    fn test_admin_cannot_grant_owner() {
        let result = check_role_change(
            &access(ClubRole::Admin),
            ClubRole::Viewer,
            Some(ClubRole::Owner),
            1,
        );
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn test_admin_cannot_demote_owner() {
        let result = check_role_change(
            &access(ClubRole::Admin),
            ClubRole::Owner,
            Some(ClubRole::Viewer),
            3,
        );
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn test_last_owner_is_kept() {
        let owner = access(ClubRole::Owner);

        let demote = check_role_change(&owner, ClubRole::Owner, Some(ClubRole::Admin), 1);
        assert!(matches!(demote, Err(AppError::Conflict(_))));

        let remove = check_role_change(&owner, ClubRole::Owner, None, 1);
        assert!(matches!(remove, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_owner_changes_with_other_owners_allowed() {
        let owner = access(ClubRole::Owner);

        assert!(check_role_change(&owner, ClubRole::Owner, Some(ClubRole::Admin), 2).is_ok());
        assert!(check_role_change(&owner, ClubRole::Owner, None, 2).is_ok());
        assert!(check_role_change(&owner, ClubRole::Viewer, Some(ClubRole::Owner), 1).is_ok());
    }

    #[test]
    fn test_admin_manages_non_owner_roles() {
        let admin = access(ClubRole::Admin);

        assert!(check_role_change(
            &admin,
            ClubRole::Viewer,
            Some(ClubRole::MemberManager),
            1
        )
        .is_ok());
        assert!(check_role_change(&admin, ClubRole::MemberManager, None, 1).is_ok());
    }
}

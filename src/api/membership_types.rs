use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::api::validation;
use crate::error::{AppError, Result};
use crate::models::membership_type::{
    CreateMembershipTypeData, MembershipType, UpdateMembershipTypeData,
};
use crate::services::permissions::{self, Permission};

#[derive(Debug, Deserialize)]
struct ListQuery {
    active_only: Option<bool>,
}

async fn list_membership_types(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MembershipType>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewClub).await?;

    let types =
        MembershipType::list_by_club(&state.pool, club_id, query.active_only.unwrap_or(false))
            .await?;

    Ok(Json(types))
}

async fn create_membership_type(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Json(body): Json<CreateMembershipTypeData>,
) -> Result<(StatusCode, Json<MembershipType>)> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembershipTypes).await?;

    let data = CreateMembershipTypeData {
        name: validation::required("Name", &body.name)?,
        description: validation::optional(body.description),
        probation_days: validation::probation_days(body.probation_days)?,
    };

    let membership_type = MembershipType::create(&state.pool, club_id, &data).await?;

    tracing::info!(
        club_id = %club_id,
        membership_type_id = %membership_type.id,
        "Created membership type"
    );

    Ok((StatusCode::CREATED, Json(membership_type)))
}

async fn get_membership_type(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MembershipType>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewClub).await?;

    let membership_type = MembershipType::find_in_club(&state.pool, club_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Membership type"))?;

    Ok(Json(membership_type))
}

async fn update_membership_type(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateMembershipTypeData>,
) -> Result<Json<MembershipType>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembershipTypes).await?;

    let data = UpdateMembershipTypeData {
        name: body
            .name
            .map(|n| validation::required("Name", &n))
            .transpose()?,
        description: validation::optional(body.description),
        probation_days: validation::probation_days(body.probation_days)?,
        is_active: body.is_active,
    };

    let membership_type = MembershipType::update(&state.pool, club_id, id, &data)
        .await?
        .ok_or_else(|| AppError::not_found("Membership type"))?;

    Ok(Json(membership_type))
}

/// Types still referenced by members or history answer 409; deactivate them instead
async fn delete_membership_type(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembershipTypes).await?;

    let deleted = MembershipType::delete(&state.pool, club_id, id)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(
                "Membership type is in use; deactivate it instead".to_string(),
            ),
            other => other,
        })?;

    if !deleted {
        return Err(AppError::not_found("Membership type"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/clubs/:club_id/membership-types",
            get(list_membership_types).post(create_membership_type),
        )
        .route(
            "/clubs/:club_id/membership-types/:id",
            get(get_membership_type)
                .patch(update_membership_type)
                .delete(delete_membership_type),
        )
}

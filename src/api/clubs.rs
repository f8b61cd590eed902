use axum::{
    extract::{Path, State},
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
use crate::models::club::{Club, CreateClubData, UpdateClubData};
use crate::services::permissions::{self, Permission};

#[derive(Debug, Deserialize)]
struct CreateClubRequest {
    name: String,
    slug: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateClubRequest {
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
}

/// Clubs visible to the user; super admins see every club
async fn list_clubs(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Club>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;

    let clubs = if user.is_super_admin {
        Club::list_all(&state.pool).await?
    } else {
        Club::list_for_user(&state.pool, user.id).await?
    };

    Ok(Json(clubs))
}

async fn create_club(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateClubRequest>,
) -> Result<(StatusCode, Json<Club>)> {
    let user = get_authenticated_user(&state.pool, &session).await?;

    let data = CreateClubData {
        name: validation::required("Club name", &body.name)?,
        slug: validation::slug(&body.slug)?,
        description: validation::optional(body.description),
    };

    let club = Club::create_with_owner(&state.pool, &data, user.id).await?;

    tracing::info!(club_id = %club.id, owner_id = %user.id, "Created club");

    Ok((StatusCode::CREATED, Json(club)))
}

async fn get_club(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
) -> Result<Json<Club>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewClub).await?;

    let club = Club::find_by_id(&state.pool, club_id)
        .await?
        .ok_or_else(|| AppError::not_found("Club"))?;

    Ok(Json(club))
}

async fn update_club(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Json(body): Json<UpdateClubRequest>,
) -> Result<Json<Club>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageClub).await?;

    let data = UpdateClubData {
        name: body
            .name
            .map(|n| validation::required("Club name", &n))
            .transpose()?,
        slug: body.slug.map(|s| validation::slug(&s)).transpose()?,
        description: validation::optional(body.description),
    };

    let club = Club::update(&state.pool, club_id, &data)
        .await?
        .ok_or_else(|| AppError::not_found("Club"))?;

    tracing::info!(club_id = %club.id, "Updated club");

    Ok(Json(club))
}

async fn delete_club(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::DeleteClub).await?;

    if !Club::delete(&state.pool, club_id).await? {
        return Err(AppError::not_found("Club"));
    }

    tracing::warn!(club_id = %club_id, deleted_by = %user.id, "Deleted club");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clubs", get(list_clubs).post(create_club))
        .route(
            "/clubs/:club_id",
            get(get_club).patch(update_club).delete(delete_club),
        )
}

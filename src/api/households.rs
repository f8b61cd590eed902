use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::api::validation;
use crate::error::{AppError, Result};
use crate::models::{
    household::{Household, HouseholdData},
    member::{Member, MemberFilter},
};
use crate::services::permissions::{self, Permission};

#[derive(Debug, Deserialize)]
struct UpdateHouseholdRequest {
    name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Serialize)]
struct HouseholdDetail {
    #[serde(flatten)]
    household: Household,
    members: Vec<Member>,
}

async fn list_households(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
) -> Result<Json<Vec<Household>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    Ok(Json(Household::list_by_club(&state.pool, club_id).await?))
}

async fn create_household(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Json(body): Json<HouseholdData>,
) -> Result<(StatusCode, Json<Household>)> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageHouseholds).await?;

    let data = HouseholdData {
        name: validation::required("Household name", &body.name)?,
        address: validation::optional(body.address),
    };

    let household = Household::create(&state.pool, club_id, &data).await?;

    tracing::info!(club_id = %club_id, household_id = %household.id, "Created household");

    Ok((StatusCode::CREATED, Json(household)))
}

async fn get_household(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<HouseholdDetail>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    let household = Household::find_in_club(&state.pool, club_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Household"))?;

    let members = Member::list(
        &state.pool,
        club_id,
        &MemberFilter {
            status: None,
            household_id: Some(household.id),
        },
    )
    .await?;

    Ok(Json(HouseholdDetail { household, members }))
}

async fn update_household(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateHouseholdRequest>,
) -> Result<Json<Household>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageHouseholds).await?;

    let name = body
        .name
        .map(|n| validation::required("Household name", &n))
        .transpose()?;

    let household = Household::update(
        &state.pool,
        club_id,
        id,
        name,
        validation::optional(body.address),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Household"))?;

    Ok(Json(household))
}

async fn delete_household(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageHouseholds).await?;

    if !Household::delete(&state.pool, club_id, id).await? {
        return Err(AppError::not_found("Household"));
    }

    tracing::info!(club_id = %club_id, household_id = %id, "Deleted household");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/clubs/:club_id/households",
            get(list_households).post(create_household),
        )
        .route(
            "/clubs/:club_id/households/:id",
            get(get_household)
                .patch(update_household)
                .delete(delete_household),
        )
}

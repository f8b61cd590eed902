use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::api::validation;
use crate::error::{AppError, Result};
use crate::models::{
    member::{CreateMemberData, Member, MemberFilter, MemberStatus, UpdateMemberData},
    Household, MemberStatusTransition, MembershipPeriod,
};
use crate::services::{
    member_status::{Actor, TransitionOutcome, TransitionRequest},
    permissions::{self, Permission},
    status_machine,
};

#[derive(Debug, Deserialize)]
struct SetHouseholdRequest {
    household_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ScheduleLeaveRequest {
    leave_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct StatusOverview {
    member_id: Uuid,
    status: MemberStatus,
    membership_type_id: Option<Uuid>,
    probation_ends_on: Option<NaiveDate>,
    scheduled_leave_on: Option<NaiveDate>,
    allowed_transitions: Vec<MemberStatus>,
}

impl From<&Member> for StatusOverview {
    fn from(member: &Member) -> Self {
        Self {
            member_id: member.id,
            status: member.status,
            membership_type_id: member.membership_type_id,
            probation_ends_on: member.probation_ends_on,
            scheduled_leave_on: member.scheduled_leave_on,
            allowed_transitions: status_machine::allowed_transitions(member.status).to_vec(),
        }
    }
}

fn validate_new_member(body: CreateMemberData) -> Result<CreateMemberData> {
    Ok(CreateMemberData {
        household_id: body.household_id,
        member_number: validation::optional(body.member_number),
        first_name: validation::required("First name", &body.first_name)?,
        last_name: validation::required("Last name", &body.last_name)?,
        email: validation::optional_email(body.email)?,
        phone: validation::optional(body.phone),
        birth_date: body.birth_date,
    })
}

fn validate_member_update(body: UpdateMemberData) -> Result<UpdateMemberData> {
    Ok(UpdateMemberData {
        member_number: body.member_number.map(validation::optional),
        first_name: body
            .first_name
            .map(|n| validation::required("First name", &n))
            .transpose()?,
        last_name: body
            .last_name
            .map(|n| validation::required("Last name", &n))
            .transpose()?,
        email: body.email.map(validation::optional_email).transpose()?,
        phone: body.phone.map(validation::optional),
        birth_date: body.birth_date,
    })
}

async fn find_member(state: &AppState, club_id: Uuid, id: Uuid) -> Result<Member> {
    Member::find_in_club(&state.pool, club_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Member"))
}

async fn list_members(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Query(filter): Query<MemberFilter>,
) -> Result<Json<Vec<Member>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    Ok(Json(Member::list(&state.pool, club_id, &filter).await?))
}

async fn create_member(
    State(state): State<AppState>,
    session: Session,
    Path(club_id): Path<Uuid>,
    Json(body): Json<CreateMemberData>,
) -> Result<(StatusCode, Json<Member>)> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembers).await?;

    let data = validate_new_member(body)?;
    let member = state
        .member_status
        .create_member(club_id, &data, Actor::user(user.id))
        .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

async fn get_member(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Member>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    Ok(Json(find_member(&state, club_id, id).await?))
}

async fn update_member(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateMemberData>,
) -> Result<Json<Member>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembers).await?;

    let data = validate_member_update(body)?;
    let member = Member::update_details(&state.pool, club_id, id, &data)
        .await?
        .ok_or_else(|| AppError::not_found("Member"))?;

    Ok(Json(member))
}

/// Only members that never left PENDING can be deleted; everyone else leaves
/// through the LEFT status so their history is kept
async fn delete_member(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembers).await?;

    if Member::delete_pending(&state.pool, club_id, id).await? {
        tracing::info!(club_id = %club_id, member_id = %id, "Deleted pending member");
        return Ok(StatusCode::NO_CONTENT);
    }

    let member = find_member(&state, club_id, id).await?;
    Err(AppError::Conflict(format!(
        "Member is {}; only PENDING members can be deleted",
        member.status
    )))
}

async fn set_household(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetHouseholdRequest>,
) -> Result<Json<Member>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ManageMembers).await?;

    if let Some(household_id) = body.household_id {
        Household::find_in_club(&state.pool, club_id, household_id)
            .await?
            .ok_or_else(|| AppError::Validation("Household not found in this club".into()))?;
    }

    let member = Member::set_household(&state.pool, club_id, id, body.household_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member"))?;

    Ok(Json(member))
}

async fn get_status(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StatusOverview>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    let member = find_member(&state, club_id, id).await?;

    Ok(Json(StatusOverview::from(&member)))
}

async fn change_status(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<TransitionOutcome>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ChangeMemberStatus).await?;

    let request = TransitionRequest {
        reason: validation::optional(body.reason),
        ..body
    };

    let outcome = state
        .member_status
        .transition(club_id, id, &request, Actor::user(user.id))
        .await?;

    Ok(Json(outcome))
}

async fn list_status_transitions(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<MemberStatusTransition>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    Ok(Json(state.member_status.history(club_id, id).await?))
}

async fn list_periods(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<MembershipPeriod>>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ViewMembers).await?;

    Ok(Json(state.member_status.periods(club_id, id).await?))
}

async fn schedule_leave(
    State(state): State<AppState>,
    session: Session,
    Path((club_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ScheduleLeaveRequest>,
) -> Result<Json<Member>> {
    let user = get_authenticated_user(&state.pool, &session).await?;
    permissions::require(&state.pool, &user, club_id, Permission::ChangeMemberStatus).await?;

    let member = state
        .member_status
        .schedule_leave(club_id, id, body.leave_on)
        .await?;

    Ok(Json(member))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/clubs/:club_id/members",
            get(list_members).post(create_member),
        )
        .route(
            "/clubs/:club_id/members/:id",
            get(get_member).patch(update_member).delete(delete_member),
        )
        .route("/clubs/:club_id/members/:id/household", put(set_household))
        .route(
            "/clubs/:club_id/members/:id/status",
            get(get_status).post(change_status),
        )
        .route(
            "/clubs/:club_id/members/:id/status-transitions",
            get(list_status_transitions),
        )
        .route("/clubs/:club_id/members/:id/periods", get(list_periods))
        .route(
            "/clubs/:club_id/members/:id/scheduled-leave",
            put(schedule_leave),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_member_fields_are_normalized() {
        let data = validate_new_member(CreateMemberData {
            member_number: Some("  ".into()),
            first_name: " Grace ".into(),
            last_name: "Hopper".into(),
            email: Some(" grace@navy.mil ".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(data.first_name, "Grace");
        assert_eq!(data.member_number, None);
        assert_eq!(data.email.as_deref(), Some("grace@navy.mil"));
    }

    #[test]
    fn test_new_member_requires_names() {
        let result = validate_new_member(CreateMemberData {
            first_name: "".into(),
            last_name: "Hopper".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_member_update_rejects_blank_name() {
        let result = validate_member_update(UpdateMemberData {
            last_name: Some(" ".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_member_update_blank_clears_field() {
        let data = validate_member_update(UpdateMemberData {
            phone: Some(Some("   ".into())),
            email: Some(Some(" ada@example.org ".into())),
            member_number: Some(None),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(data.phone, Some(None));
        assert_eq!(data.email, Some(Some("ada@example.org".to_string())));
        assert_eq!(data.member_number, Some(None));
        assert_eq!(data.birth_date, None);
    }

    #[test]
    fn test_member_update_rejects_bad_email() {
        let result = validate_member_update(UpdateMemberData {
            email: Some(Some("not-an-email".into())),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_status_overview_lists_allowed_transitions() {
        let member = Member {
            id: Uuid::new_v4(),
            club_id: Uuid::new_v4(),
            household_id: None,
            membership_type_id: None,
            member_number: None,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: None,
            phone: None,
            birth_date: None,
            status: MemberStatus::Pending,
            joined_on: None,
            probation_ends_on: None,
            scheduled_leave_on: None,
            left_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let overview = StatusOverview::from(&member);

        assert_eq!(
            overview.allowed_transitions,
            vec![MemberStatus::Probation, MemberStatus::Active, MemberStatus::Left]
        );
    }

    #[test]
    fn test_transition_request_parses() {
        let request: TransitionRequest = serde_json::from_str(
            r#"{"to_status":"SUSPENDED","reason":"Unpaid dues","expected_status":"ACTIVE"}"#,
        )
        .unwrap();

        assert_eq!(request.to_status, MemberStatus::Suspended);
        assert_eq!(request.expected_status, Some(MemberStatus::Active));
        assert!(request.effective_date.is_none());
    }
}

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    member::{CreateMemberData, Member, MemberStatus},
    member_status_transition::{CreateTransitionData, MemberStatusTransition},
    Household, MembershipPeriod, MembershipType,
};
use crate::services::status_machine::{
    plan_transition, MemberSnapshot, OpenPeriod, TransitionInput, TypeInfo,
};

/// Who caused a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_automatic: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_automatic: false,
        }
    }

    /// The scheduled job, acting as the system user
    pub fn system(system_user_id: Uuid) -> Self {
        Self {
            user_id: system_user_id,
            is_automatic: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub to_status: MemberStatus,
    pub membership_type_id: Option<Uuid>,
    pub effective_date: Option<NaiveDate>,
    pub probation_ends_on: Option<NaiveDate>,
    pub reason: Option<String>,
    /// Rejects the change with a conflict if the member moved on meanwhile
    pub expected_status: Option<MemberStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub member: Member,
    pub transition: MemberStatusTransition,
    pub closed_period: Option<MembershipPeriod>,
    pub opened_period: Option<MembershipPeriod>,
}

#[derive(Clone)]
pub struct MemberStatusService {
    pool: PgPool,
}

impl MemberStatusService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a PENDING member together with its creation audit record
    pub async fn create_member(
        &self,
        club_id: Uuid,
        data: &CreateMemberData,
        actor: Actor,
    ) -> Result<Member> {
        if let Some(household_id) = data.household_id {
            Household::find_in_club(&self.pool, club_id, household_id)
                .await?
                .ok_or_else(|| AppError::Validation("Household not found in this club".into()))?;
        }

        let mut tx = self.pool.begin().await?;

        let member = Member::create(&mut *tx, club_id, data).await?;

        MemberStatusTransition::record(
            &mut *tx,
            &CreateTransitionData {
                member_id: member.id,
                club_id,
                from_status: None,
                to_status: MemberStatus::Pending,
                from_membership_type_id: None,
                to_membership_type_id: None,
                effective_date: Utc::now().date_naive(),
                reason: Some("Member created".to_string()),
                actor_user_id: actor.user_id,
                is_automatic: actor.is_automatic,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            member_id = %member.id,
            club_id = %club_id,
            actor = %actor.user_id,
            "Member created"
        );

        Ok(member)
    }

    pub async fn transition(
        &self,
        club_id: Uuid,
        member_id: Uuid,
        request: &TransitionRequest,
        actor: Actor,
    ) -> Result<TransitionOutcome> {
        self.transition_on(club_id, member_id, request, actor, Utc::now().date_naive())
            .await
    }

    /// Validates and applies one status change atomically: member row and open
    /// period are locked, the plan is computed, periods are closed/opened, the
    /// member is updated and the audit row appended, all in one transaction.
    pub async fn transition_on(
        &self,
        club_id: Uuid,
        member_id: Uuid,
        request: &TransitionRequest,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let member = in_club(Member::lock_for_update(&mut *tx, member_id).await?, club_id)?;
        check_expected_status(&member, request.expected_status)?;

        let open_period = MembershipPeriod::lock_open_for_member(&mut *tx, member.id).await?;
        let last_effective_date =
            MemberStatusTransition::last_effective_date(&mut *tx, member.id).await?;

        let requested_type = match request.membership_type_id {
            Some(type_id) => {
                let membership_type =
                    MembershipType::find_in_club_tx(&mut *tx, club_id, type_id).await?;
                Some(validate_requested_type(membership_type, &member)?)
            }
            None => None,
        };

        let current_type = match member.membership_type_id {
            Some(type_id) => MembershipType::find_in_club_tx(&mut *tx, club_id, type_id)
                .await?
                .map(|t| type_info(&t)),
            None => None,
        };

        let snapshot = MemberSnapshot {
            status: member.status,
            membership_type_id: member.membership_type_id,
            joined_on: member.joined_on,
            probation_ends_on: member.probation_ends_on,
            scheduled_leave_on: member.scheduled_leave_on,
            open_period: open_period.as_ref().map(|p| OpenPeriod {
                id: p.id,
                membership_type_id: p.membership_type_id,
                start_date: p.start_date,
            }),
            last_effective_date,
        };

        let input = TransitionInput {
            to: request.to_status,
            requested_type,
            current_type,
            effective_date: request.effective_date,
            probation_ends_on: request.probation_ends_on,
            clamp_to_history: actor.is_automatic,
        };

        let plan = plan_transition(&snapshot, &input, today)?;

        let closed_period = match plan.close_period {
            Some(close) => {
                Some(MembershipPeriod::close(&mut *tx, close.period_id, close.end_date).await?)
            }
            None => None,
        };

        let opened_period = match plan.open_period {
            Some(open) => Some(
                MembershipPeriod::open(
                    &mut *tx,
                    member.id,
                    open.membership_type_id,
                    open.start_date,
                )
                .await?,
            ),
            None => None,
        };

        let updated = Member::apply_status_fields(&mut *tx, member.id, &plan.fields).await?;

        let transition = MemberStatusTransition::record(
            &mut *tx,
            &CreateTransitionData {
                member_id: member.id,
                club_id,
                from_status: Some(plan.from),
                to_status: plan.to,
                from_membership_type_id: plan.from_membership_type_id,
                to_membership_type_id: plan.to_membership_type_id,
                effective_date: plan.effective_date,
                reason: request.reason.clone(),
                actor_user_id: actor.user_id,
                is_automatic: actor.is_automatic,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            member_id = %member.id,
            club_id = %club_id,
            from = %plan.from,
            to = %plan.to,
            effective_date = %plan.effective_date,
            automatic = actor.is_automatic,
            "Member status changed"
        );

        Ok(TransitionOutcome {
            member: updated,
            transition,
            closed_period,
            opened_period,
        })
    }

    /// Sets or clears the date on which the scheduled job moves the member to LEFT
    pub async fn schedule_leave(
        &self,
        club_id: Uuid,
        member_id: Uuid,
        leave_on: Option<NaiveDate>,
    ) -> Result<Member> {
        let mut tx = self.pool.begin().await?;

        let member = in_club(Member::lock_for_update(&mut *tx, member_id).await?, club_id)?;

        if member.status == MemberStatus::Left {
            return Err(AppError::InvalidTransition(
                "Member has already left".to_string(),
            ));
        }

        if let (Some(leave_on), Some(joined_on)) = (leave_on, member.joined_on) {
            if leave_on < joined_on {
                return Err(AppError::Validation(format!(
                    "Departure date {} is before the join date {}",
                    leave_on, joined_on
                )));
            }
        }

        let updated = Member::set_scheduled_leave(&mut *tx, member.id, leave_on).await?;

        tx.commit().await?;

        tracing::info!(
            member_id = %member.id,
            scheduled_leave_on = ?leave_on,
            "Member departure scheduled"
        );

        Ok(updated)
    }

    pub async fn history(
        &self,
        club_id: Uuid,
        member_id: Uuid,
    ) -> Result<Vec<MemberStatusTransition>> {
        self.require_member(club_id, member_id).await?;
        Ok(MemberStatusTransition::list_by_member(&self.pool, member_id).await?)
    }

    pub async fn periods(&self, club_id: Uuid, member_id: Uuid) -> Result<Vec<MembershipPeriod>> {
        self.require_member(club_id, member_id).await?;
        Ok(MembershipPeriod::list_by_member(&self.pool, member_id).await?)
    }

    async fn require_member(&self, club_id: Uuid, member_id: Uuid) -> Result<Member> {
        Member::find_in_club(&self.pool, club_id, member_id)
            .await?
            .ok_or_else(|| AppError::not_found("Member"))
    }
}

/// Members of other clubs are reported as missing
fn in_club(member: Option<Member>, club_id: Uuid) -> Result<Member> {
    member
        .filter(|m| m.club_id == club_id)
        .ok_or_else(|| AppError::not_found("Member"))
}

fn check_expected_status(member: &Member, expected: Option<MemberStatus>) -> Result<()> {
    match expected {
        Some(expected) if expected != member.status => Err(AppError::Conflict(format!(
            "Member status is {} but {} was expected",
            member.status, expected
        ))),
        _ => Ok(()),
    }
}

/// The requested type must belong to the member's club and be active. An
/// inactive type is still accepted when it is the one the member already has.
fn validate_requested_type(
    membership_type: Option<MembershipType>,
    member: &Member,
) -> Result<TypeInfo> {
    let membership_type = membership_type
        .filter(|t| t.club_id == member.club_id)
        .ok_or_else(|| AppError::Validation("Membership type not found in this club".into()))?;

    if !membership_type.is_active && member.membership_type_id != Some(membership_type.id) {
        return Err(AppError::Validation(format!(
            "Membership type {} is inactive",
            membership_type.name
        )));
    }

    Ok(type_info(&membership_type))
}

fn type_info(membership_type: &MembershipType) -> TypeInfo {
    TypeInfo {
        id: membership_type.id,
        probation_days: membership_type.probation_days,
    }
}

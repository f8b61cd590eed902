use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::member::{Member, MemberStatus};
use crate::services::member_status::{Actor, MemberStatusService, TransitionRequest};

const BATCH_SIZE: i64 = 200;

pub const PROBATION_COMPLETED_REASON: &str = "Probation period completed";
pub const SCHEDULED_DEPARTURE_REASON: &str = "Scheduled departure";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AutoTransitionStats {
    pub probations_completed: usize,
    pub departures_completed: usize,
    pub skipped: usize,
    pub failures: usize,
}

impl AutoTransitionStats {
    fn record(&mut self, pass: Pass, outcome: Outcome) {
        match (outcome, pass) {
            (Outcome::Applied, Pass::ProbationCompletion) => self.probations_completed += 1,
            (Outcome::Applied, Pass::Departure) => self.departures_completed += 1,
            (Outcome::Skipped, _) => self.skipped += 1,
            (Outcome::Failed, _) => self.failures += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    ProbationCompletion,
    Departure,
}

impl Pass {
    fn due_date(self, member: &Member) -> Option<NaiveDate> {
        match self {
            Pass::ProbationCompletion => member.probation_ends_on,
            Pass::Departure => member.scheduled_leave_on,
        }
    }

    fn request(self, member: &Member) -> Option<TransitionRequest> {
        match self {
            Pass::ProbationCompletion => probation_completion_request(member),
            Pass::Departure => departure_request(member),
        }
    }

    async fn fetch(
        self,
        pool: &PgPool,
        today: NaiveDate,
        after: Option<(NaiveDate, Uuid)>,
    ) -> Result<Vec<Member>, sqlx::Error> {
        match self {
            Pass::ProbationCompletion => {
                Member::find_probation_due(pool, today, after, BATCH_SIZE).await
            }
            Pass::Departure => Member::find_leave_due(pool, today, after, BATCH_SIZE).await,
        }
    }
}

/// Keyset position of the last member in a batch
fn next_cursor(pass: Pass, batch: &[Member]) -> Option<(NaiveDate, Uuid)> {
    batch
        .iter()
        .rev()
        .find_map(|m| pass.due_date(m).map(|date| (date, m.id)))
}

/// Applies every time-based transition due on or before `today`.
///
/// 1. PROBATION members whose probation ended → ACTIVE, effective on the
///    probation end date
/// 2. members with a scheduled departure → LEFT, effective on that date
///
/// Effective dates are the due dates, not the run date, so a run that happens
/// late (service downtime) records the same history an on-time run would.
/// Each member is transitioned in its own transaction and visited once per
/// run; one failure never stops the batch.
pub async fn run_auto_transitions(
    pool: &PgPool,
    system_user_id: Uuid,
    today: NaiveDate,
) -> Result<AutoTransitionStats, sqlx::Error> {
    let service = MemberStatusService::new(pool.clone());
    let actor = Actor::system(system_user_id);
    let mut stats = AutoTransitionStats::default();

    tracing::info!(%today, "Starting member status auto-transition job");

    for pass in [Pass::ProbationCompletion, Pass::Departure] {
        let mut after = None;

        loop {
            let due = pass.fetch(pool, today, after).await?;
            let Some(cursor) = next_cursor(pass, &due) else {
                break;
            };

            for member in &due {
                let Some(request) = pass.request(member) else {
                    continue;
                };
                let outcome = apply(&service, member, &request, actor, today).await;
                stats.record(pass, outcome);
            }

            if (due.len() as i64) < BATCH_SIZE {
                break;
            }
            after = Some(cursor);
        }
    }

    tracing::info!(?stats, "Member status auto-transition job completed");

    Ok(stats)
}

async fn apply(
    service: &MemberStatusService,
    member: &Member,
    request: &TransitionRequest,
    actor: Actor,
    today: NaiveDate,
) -> Outcome {
    let result = service
        .transition_on(member.club_id, member.id, request, actor, today)
        .await
        .map(|_| ());

    let outcome = classify(&result);
    match (&outcome, result) {
        (Outcome::Skipped, Err(e)) => {
            tracing::info!(
                member_id = %member.id,
                reason = %e,
                "Member changed before the automatic transition, skipping"
            );
        }
        (Outcome::Failed, Err(e)) => {
            tracing::error!(
                member_id = %member.id,
                club_id = %member.club_id,
                to = %request.to_status,
                error = %e,
                "Automatic status transition failed"
            );
        }
        _ => {}
    }

    outcome
}

fn classify(result: &Result<(), AppError>) -> Outcome {
    match result {
        Ok(()) => Outcome::Applied,
        // Someone changed or removed the member between selection and lock
        Err(AppError::Conflict(_)) | Err(AppError::NotFound(_)) => Outcome::Skipped,
        Err(_) => Outcome::Failed,
    }
}

fn probation_completion_request(member: &Member) -> Option<TransitionRequest> {
    if member.status != MemberStatus::Probation {
        return None;
    }

    Some(TransitionRequest {
        to_status: MemberStatus::Active,
        membership_type_id: None,
        effective_date: Some(member.probation_ends_on?),
        probation_ends_on: None,
        reason: Some(PROBATION_COMPLETED_REASON.to_string()),
        expected_status: Some(MemberStatus::Probation),
    })
}

fn departure_request(member: &Member) -> Option<TransitionRequest> {
    if member.status == MemberStatus::Left {
        return None;
    }

    Some(TransitionRequest {
        to_status: MemberStatus::Left,
        membership_type_id: None,
        effective_date: Some(member.scheduled_leave_on?),
        probation_ends_on: None,
        reason: Some(SCHEDULED_DEPARTURE_REASON.to_string()),
        expected_status: Some(member.status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn member(status: MemberStatus) -> Member {
        Member {
            id: Uuid::new_v4(),
            club_id: Uuid::new_v4(),
            household_id: None,
            membership_type_id: Some(Uuid::new_v4()),
            member_number: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            phone: None,
            birth_date: None,
            status,
            joined_on: NaiveDate::from_ymd_opt(2025, 1, 1),
            probation_ends_on: None,
            scheduled_leave_on: None,
            left_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_probation_request_uses_due_date() {
        let mut m = member(MemberStatus::Probation);
        m.probation_ends_on = NaiveDate::from_ymd_opt(2025, 4, 1);

        let request = probation_completion_request(&m).unwrap();

        assert_eq!(request.to_status, MemberStatus::Active);
        assert_eq!(request.effective_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(request.expected_status, Some(MemberStatus::Probation));
        assert_eq!(request.reason.as_deref(), Some(PROBATION_COMPLETED_REASON));
        assert!(request.membership_type_id.is_none());
    }

    #[test]
    fn test_probation_request_requires_end_date() {
        let m = member(MemberStatus::Probation);
        assert!(probation_completion_request(&m).is_none());

        let mut active = member(MemberStatus::Active);
        active.probation_ends_on = NaiveDate::from_ymd_opt(2025, 4, 1);
        assert!(probation_completion_request(&active).is_none());
    }

    #[test]
    fn test_departure_request_guards_current_status() {
        let mut m = member(MemberStatus::Suspended);
        m.scheduled_leave_on = NaiveDate::from_ymd_opt(2025, 5, 31);

        let request = departure_request(&m).unwrap();

        assert_eq!(request.to_status, MemberStatus::Left);
        assert_eq!(request.effective_date, NaiveDate::from_ymd_opt(2025, 5, 31));
        assert_eq!(request.expected_status, Some(MemberStatus::Suspended));
    }

    #[test]
    fn test_departure_request_skips_left_members() {
        let mut m = member(MemberStatus::Left);
        m.scheduled_leave_on = NaiveDate::from_ymd_opt(2025, 5, 31);
        assert!(departure_request(&m).is_none());
    }

    #[test]
    fn test_classify_outcomes() {
        assert_eq!(classify(&Ok(())), Outcome::Applied);
        assert_eq!(
            classify(&Err(AppError::Conflict("changed".into()))),
            Outcome::Skipped
        );
        assert_eq!(classify(&Err(AppError::not_found("Member"))), Outcome::Skipped);
        assert_eq!(
            classify(&Err(AppError::Validation("bad".into()))),
            Outcome::Failed
        );
        assert_eq!(
            classify(&Err(AppError::Database(sqlx::Error::PoolTimedOut))),
            Outcome::Failed
        );
    }

    #[test]
    fn test_cursor_follows_last_member_of_batch() {
        let mut first = member(MemberStatus::Probation);
        first.probation_ends_on = NaiveDate::from_ymd_opt(2025, 3, 1);
        let mut last = member(MemberStatus::Probation);
        last.probation_ends_on = NaiveDate::from_ymd_opt(2025, 3, 2);
        let last_id = last.id;

        assert_eq!(
            next_cursor(Pass::ProbationCompletion, &[first, last]),
            Some((NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(), last_id))
        );
        assert_eq!(next_cursor(Pass::Departure, &[]), None);
    }

    #[test]
    fn test_cursor_uses_the_pass_due_date() {
        let mut m = member(MemberStatus::Active);
        m.scheduled_leave_on = NaiveDate::from_ymd_opt(2025, 5, 31);
        let id = m.id;

        assert_eq!(
            next_cursor(Pass::Departure, std::slice::from_ref(&m)),
            Some((NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(), id))
        );
        assert_eq!(next_cursor(Pass::ProbationCompletion, &[m]), None);
    }

    #[test]
    fn test_stats_record_outcomes_per_pass() {
        let mut stats = AutoTransitionStats::default();

        stats.record(Pass::ProbationCompletion, Outcome::Applied);
        stats.record(Pass::Departure, Outcome::Applied);
        stats.record(Pass::Departure, Outcome::Applied);
        stats.record(Pass::ProbationCompletion, Outcome::Skipped);
        stats.record(Pass::Departure, Outcome::Failed);

        assert_eq!(
            stats,
            AutoTransitionStats {
                probations_completed: 1,
                departures_completed: 2,
                skipped: 1,
                failures: 1,
            }
        );
    }
}

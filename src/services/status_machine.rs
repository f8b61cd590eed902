//! Member lifecycle rules.
//!
//! Everything here is pure: given a snapshot of the member as locked inside a
//! transaction and the requested target, [`plan_transition`] decides whether
//! the move is legal and computes every side effect (period close/open, member
//! field updates). `member_status` applies the plan to the database.

use chrono::{Days, NaiveDate};
use thiserror::Error;
use uuid::Uuid;

use crate::models::member::{MemberStatus, StatusFields};

use MemberStatus::*;

/// Allowed next statuses for each current status
pub fn allowed_transitions(from: MemberStatus) -> &'static [MemberStatus] {
    match from {
        Pending => &[Probation, Active, Left],
        Probation => &[Probation, Active, Suspended, Left],
        Active => &[Active, Dormant, Suspended, Left],
        Dormant => &[Dormant, Active, Suspended, Left],
        Suspended => &[Active, Dormant, Left],
        Left => &[],
    }
}

pub fn can_transition(from: MemberStatus, to: MemberStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Statuses during which the member holds a membership type (and an open period)
pub fn holds_membership(status: MemberStatus) -> bool {
    matches!(status, Probation | Active | Dormant | Suspended)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot change status from {from} to {to}")]
    NotAllowed {
        from: MemberStatus,
        to: MemberStatus,
    },

    #[error("effective date {0} is in the future")]
    FutureEffectiveDate(NaiveDate),

    #[error("effective date {effective} is before the last recorded change on {last}")]
    BeforeLastChange { effective: NaiveDate, last: NaiveDate },

    #[error("effective date {effective} is before the current membership period start {period_start}")]
    BeforeOpenPeriod {
        effective: NaiveDate,
        period_start: NaiveDate,
    },

    #[error("status {0} requires a membership type")]
    MembershipTypeRequired(MemberStatus),

    #[error("staying in {0} is only allowed when the membership type changes")]
    SelfTransitionWithoutTypeChange(MemberStatus),

    #[error("a membership type cannot be assigned when leaving")]
    MembershipTypeOnLeave,

    #[error("a probation end date only applies when the target status is PROBATION")]
    ProbationEndOutsideProbation,

    #[error("probation end date {ends} is before the effective date {effective}")]
    ProbationEndsBeforeEffective { ends: NaiveDate, effective: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPeriod {
    pub id: Uuid,
    pub membership_type_id: Uuid,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: Uuid,
    pub probation_days: Option<i32>,
}

/// State of the member read under lock
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub status: MemberStatus,
    pub membership_type_id: Option<Uuid>,
    pub joined_on: Option<NaiveDate>,
    pub probation_ends_on: Option<NaiveDate>,
    pub scheduled_leave_on: Option<NaiveDate>,
    pub open_period: Option<OpenPeriod>,
    pub last_effective_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct TransitionInput {
    pub to: MemberStatus,
    pub requested_type: Option<TypeInfo>,
    pub current_type: Option<TypeInfo>,
    pub effective_date: Option<NaiveDate>,
    pub probation_ends_on: Option<NaiveDate>,
    /// Move a backdated effective date forward to the latest recorded change
    /// instead of rejecting it. Used by automated transitions catching up.
    pub clamp_to_history: bool,
}

impl TransitionInput {
    pub fn to(to: MemberStatus) -> Self {
        Self {
            to,
            requested_type: None,
            current_type: None,
            effective_date: None,
            probation_ends_on: None,
            clamp_to_history: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodClose {
    pub period_id: Uuid,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodOpen {
    pub membership_type_id: Uuid,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: MemberStatus,
    pub to: MemberStatus,
    pub from_membership_type_id: Option<Uuid>,
    pub to_membership_type_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub close_period: Option<PeriodClose>,
    pub open_period: Option<PeriodOpen>,
    pub fields: StatusFields,
}

pub fn plan_transition(
    member: &MemberSnapshot,
    input: &TransitionInput,
    today: NaiveDate,
) -> Result<TransitionPlan, TransitionError> {
    let from = member.status;
    let to = input.to;

    if !can_transition(from, to) {
        return Err(TransitionError::NotAllowed { from, to });
    }

    let effective_date = resolve_effective_date(member, input, today)?;

    if input.probation_ends_on.is_some() && to != Probation {
        return Err(TransitionError::ProbationEndOutsideProbation);
    }

    let mut close_period = None;
    let mut open_period = None;

    let target_type = if !holds_membership(to) {
        if input.requested_type.is_some() {
            return Err(TransitionError::MembershipTypeOnLeave);
        }
        close_period = member.open_period.map(|p| PeriodClose {
            period_id: p.id,
            end_date: effective_date,
        });
        None
    } else {
        let target = input
            .requested_type
            .or(input.current_type)
            .ok_or(TransitionError::MembershipTypeRequired(to))?;

        if from == to && member.membership_type_id == Some(target.id) {
            return Err(TransitionError::SelfTransitionWithoutTypeChange(to));
        }

        match member.open_period {
            None => {
                open_period = Some(PeriodOpen {
                    membership_type_id: target.id,
                    start_date: effective_date,
                });
            }
            Some(period) if period.membership_type_id != target.id => {
                close_period = Some(PeriodClose {
                    period_id: period.id,
                    end_date: effective_date,
                });
                open_period = Some(PeriodOpen {
                    membership_type_id: target.id,
                    start_date: effective_date,
                });
            }
            Some(_) => {}
        }

        Some(target)
    };

    let probation_ends_on = if to == Probation {
        let ends = if from == Probation {
            input.probation_ends_on.or(member.probation_ends_on)
        } else {
            input.probation_ends_on.or_else(|| {
                target_type
                    .and_then(|t| t.probation_days)
                    .and_then(|days| u64::try_from(days).ok())
                    .and_then(|days| effective_date.checked_add_days(Days::new(days)))
            })
        };

        if let Some(ends) = input.probation_ends_on {
            if ends < effective_date {
                return Err(TransitionError::ProbationEndsBeforeEffective {
                    ends,
                    effective: effective_date,
                });
            }
        }
        ends
    } else {
        None
    };

    let joined_on = match (member.joined_on, to) {
        (None, Probation | Active) => Some(effective_date),
        (joined, _) => joined,
    };

    let fields = StatusFields {
        status: to,
        membership_type_id: target_type.map(|t| t.id),
        joined_on,
        probation_ends_on,
        scheduled_leave_on: if to == Left {
            None
        } else {
            member.scheduled_leave_on
        },
        left_on: if to == Left { Some(effective_date) } else { None },
    };

    Ok(TransitionPlan {
        from,
        to,
        from_membership_type_id: member.membership_type_id,
        to_membership_type_id: fields.membership_type_id,
        effective_date,
        close_period,
        open_period,
        fields,
    })
}

fn resolve_effective_date(
    member: &MemberSnapshot,
    input: &TransitionInput,
    today: NaiveDate,
) -> Result<NaiveDate, TransitionError> {
    let mut effective = input.effective_date.unwrap_or(today);

    if effective > today {
        return Err(TransitionError::FutureEffectiveDate(effective));
    }

    let floor = [
        member.last_effective_date,
        member.open_period.map(|p| p.start_date),
    ]
    .into_iter()
    .flatten()
    .max();

    if let Some(floor) = floor {
        if effective < floor {
            if input.clamp_to_history {
                effective = floor;
            } else if Some(floor) == member.last_effective_date {
                return Err(TransitionError::BeforeLastChange {
                    effective,
                    last: floor,
                });
            } else {
                return Err(TransitionError::BeforeOpenPeriod {
                    effective,
                    period_start: floor,
                });
            }
        }
    }

    Ok(effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 6, 15)
    }

    fn pending() -> MemberSnapshot {
        MemberSnapshot {
            status: Pending,
            membership_type_id: None,
            joined_on: None,
            probation_ends_on: None,
            scheduled_leave_on: None,
            open_period: None,
            last_effective_date: None,
        }
    }

    fn holding(status: MemberStatus, type_id: Uuid, since: NaiveDate) -> MemberSnapshot {
        MemberSnapshot {
            status,
            membership_type_id: Some(type_id),
            joined_on: Some(since),
            probation_ends_on: None,
            scheduled_leave_on: None,
            open_period: Some(OpenPeriod {
                id: Uuid::new_v4(),
                membership_type_id: type_id,
                start_date: since,
            }),
            last_effective_date: Some(since),
        }
    }

    fn type_info(probation_days: Option<i32>) -> TypeInfo {
        TypeInfo {
            id: Uuid::new_v4(),
            probation_days,
        }
    }

    #[test]
    fn test_transition_table() {
        assert!(can_transition(Pending, Probation));
        assert!(can_transition(Pending, Active));
        assert!(can_transition(Probation, Active));
        assert!(can_transition(Active, Dormant));
        assert!(can_transition(Active, Suspended));
        assert!(can_transition(Suspended, Active));
        assert!(can_transition(Dormant, Left));

        assert!(!can_transition(Pending, Pending));
        assert!(!can_transition(Pending, Dormant));
        assert!(!can_transition(Active, Probation));
        assert!(!can_transition(Suspended, Suspended));
        assert!(!can_transition(Suspended, Probation));
    }

    #[test]
    fn test_left_is_terminal() {
        assert!(allowed_transitions(Left).is_empty());
        for status in MemberStatus::ALL {
            assert!(!can_transition(Left, status));
        }
    }

    #[test]
    fn test_every_non_terminal_status_can_leave() {
        for status in MemberStatus::ALL {
            if status != Left {
                assert!(can_transition(status, Left), "{status} should reach LEFT");
            }
        }
    }

    #[test]
    fn test_disallowed_transition_rejected() {
        let member = holding(Active, Uuid::new_v4(), date(2025, 1, 1));
        let result = plan_transition(&member, &TransitionInput::to(Pending), today());

        assert_eq!(
            result,
            Err(TransitionError::NotAllowed {
                from: Active,
                to: Pending
            })
        );
    }

    #[test]
    fn test_pending_to_probation_opens_period_and_sets_probation_end() {
        let member = pending();
        let membership = type_info(Some(90));
        let input = TransitionInput {
            requested_type: Some(membership),
            effective_date: Some(date(2025, 6, 10)),
            ..TransitionInput::to(Probation)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert_eq!(plan.close_period, None);
        assert_eq!(
            plan.open_period,
            Some(PeriodOpen {
                membership_type_id: membership.id,
                start_date: date(2025, 6, 10),
            })
        );
        assert_eq!(plan.fields.probation_ends_on, Some(date(2025, 9, 8)));
        assert_eq!(plan.fields.joined_on, Some(date(2025, 6, 10)));
        assert_eq!(plan.fields.membership_type_id, Some(membership.id));
        assert_eq!(plan.from_membership_type_id, None);
        assert_eq!(plan.to_membership_type_id, Some(membership.id));
    }

    #[test]
    fn test_explicit_probation_end_wins() {
        let input = TransitionInput {
            requested_type: Some(type_info(Some(90))),
            probation_ends_on: Some(date(2025, 7, 1)),
            ..TransitionInput::to(Probation)
        };

        let plan = plan_transition(&pending(), &input, today()).unwrap();
        assert_eq!(plan.fields.probation_ends_on, Some(date(2025, 7, 1)));
    }

    #[test]
    fn test_probation_without_days_has_no_end() {
        let input = TransitionInput {
            requested_type: Some(type_info(None)),
            ..TransitionInput::to(Probation)
        };

        let plan = plan_transition(&pending(), &input, today()).unwrap();
        assert_eq!(plan.fields.probation_ends_on, None);
    }

    #[test]
    fn test_probation_end_before_effective_rejected() {
        let input = TransitionInput {
            requested_type: Some(type_info(None)),
            effective_date: Some(date(2025, 6, 10)),
            probation_ends_on: Some(date(2025, 6, 9)),
            ..TransitionInput::to(Probation)
        };

        assert!(matches!(
            plan_transition(&pending(), &input, today()),
            Err(TransitionError::ProbationEndsBeforeEffective { .. })
        ));
    }

    #[test]
    fn test_probation_end_outside_probation_rejected() {
        let input = TransitionInput {
            requested_type: Some(type_info(None)),
            probation_ends_on: Some(date(2025, 7, 1)),
            ..TransitionInput::to(Active)
        };

        assert_eq!(
            plan_transition(&pending(), &input, today()),
            Err(TransitionError::ProbationEndOutsideProbation)
        );
    }

    #[test]
    fn test_holding_status_requires_type() {
        let result = plan_transition(&pending(), &TransitionInput::to(Active), today());
        assert_eq!(result, Err(TransitionError::MembershipTypeRequired(Active)));
    }

    #[test]
    fn test_probation_to_active_keeps_period() {
        let type_id = Uuid::new_v4();
        let mut member = holding(Probation, type_id, date(2025, 3, 1));
        member.probation_ends_on = Some(date(2025, 6, 1));
        let input = TransitionInput {
            current_type: Some(TypeInfo {
                id: type_id,
                probation_days: Some(90),
            }),
            ..TransitionInput::to(Active)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert_eq!(plan.close_period, None);
        assert_eq!(plan.open_period, None);
        assert_eq!(plan.fields.probation_ends_on, None);
        assert_eq!(plan.fields.joined_on, Some(date(2025, 3, 1)));
        assert_eq!(plan.fields.membership_type_id, Some(type_id));
    }

    #[test]
    fn test_self_transition_changes_type_and_rotates_period() {
        let old_type = Uuid::new_v4();
        let member = holding(Active, old_type, date(2024, 1, 1));
        let open_id = member.open_period.unwrap().id;
        let new_type = type_info(None);
        let input = TransitionInput {
            requested_type: Some(new_type),
            current_type: Some(TypeInfo {
                id: old_type,
                probation_days: None,
            }),
            effective_date: Some(date(2025, 6, 1)),
            ..TransitionInput::to(Active)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert_eq!(
            plan.close_period,
            Some(PeriodClose {
                period_id: open_id,
                end_date: date(2025, 6, 1),
            })
        );
        assert_eq!(
            plan.open_period,
            Some(PeriodOpen {
                membership_type_id: new_type.id,
                start_date: date(2025, 6, 1),
            })
        );
        assert_eq!(plan.from_membership_type_id, Some(old_type));
        assert_eq!(plan.to_membership_type_id, Some(new_type.id));
    }

    #[test]
    fn test_self_transition_without_type_change_rejected() {
        let type_id = Uuid::new_v4();
        let member = holding(Active, type_id, date(2024, 1, 1));
        let same = TypeInfo {
            id: type_id,
            probation_days: None,
        };

        let implicit = TransitionInput {
            current_type: Some(same),
            ..TransitionInput::to(Active)
        };
        let explicit = TransitionInput {
            requested_type: Some(same),
            current_type: Some(same),
            ..TransitionInput::to(Active)
        };

        for input in [implicit, explicit] {
            assert_eq!(
                plan_transition(&member, &input, today()),
                Err(TransitionError::SelfTransitionWithoutTypeChange(Active))
            );
        }
    }

    #[test]
    fn test_probation_self_transition_keeps_end_date() {
        let mut member = holding(Probation, Uuid::new_v4(), date(2025, 5, 1));
        member.probation_ends_on = Some(date(2025, 8, 1));
        let input = TransitionInput {
            requested_type: Some(type_info(Some(10))),
            ..TransitionInput::to(Probation)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();
        assert_eq!(plan.fields.probation_ends_on, Some(date(2025, 8, 1)));
    }

    #[test]
    fn test_suspension_keeps_type_and_period() {
        let type_id = Uuid::new_v4();
        let member = holding(Active, type_id, date(2024, 1, 1));
        let input = TransitionInput {
            current_type: Some(TypeInfo {
                id: type_id,
                probation_days: None,
            }),
            ..TransitionInput::to(Suspended)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert_eq!(plan.close_period, None);
        assert_eq!(plan.open_period, None);
        assert_eq!(plan.fields.membership_type_id, Some(type_id));
        assert_eq!(plan.effective_date, today());
    }

    #[test]
    fn test_leaving_closes_period_and_clears_fields() {
        let type_id = Uuid::new_v4();
        let mut member = holding(Dormant, type_id, date(2024, 1, 1));
        member.scheduled_leave_on = Some(date(2025, 7, 1));
        let open_id = member.open_period.unwrap().id;

        let plan = plan_transition(&member, &TransitionInput::to(Left), today()).unwrap();

        assert_eq!(
            plan.close_period,
            Some(PeriodClose {
                period_id: open_id,
                end_date: today(),
            })
        );
        assert_eq!(plan.open_period, None);
        assert_eq!(plan.fields.membership_type_id, None);
        assert_eq!(plan.fields.scheduled_leave_on, None);
        assert_eq!(plan.fields.left_on, Some(today()));
        assert_eq!(plan.to_membership_type_id, None);
    }

    #[test]
    fn test_pending_can_leave_without_period() {
        let plan = plan_transition(&pending(), &TransitionInput::to(Left), today()).unwrap();

        assert_eq!(plan.close_period, None);
        assert_eq!(plan.fields.joined_on, None);
    }

    #[test]
    fn test_type_on_leave_rejected() {
        let member = holding(Active, Uuid::new_v4(), date(2024, 1, 1));
        let input = TransitionInput {
            requested_type: Some(type_info(None)),
            ..TransitionInput::to(Left)
        };

        assert_eq!(
            plan_transition(&member, &input, today()),
            Err(TransitionError::MembershipTypeOnLeave)
        );
    }

    #[test]
    fn test_future_effective_date_rejected() {
        let member = holding(Active, Uuid::new_v4(), date(2024, 1, 1));
        let input = TransitionInput {
            effective_date: Some(date(2025, 6, 16)),
            ..TransitionInput::to(Left)
        };

        assert_eq!(
            plan_transition(&member, &input, today()),
            Err(TransitionError::FutureEffectiveDate(date(2025, 6, 16)))
        );
    }

    #[test]
    fn test_backdated_before_last_change_rejected() {
        let member = holding(Active, Uuid::new_v4(), date(2025, 5, 1));
        let input = TransitionInput {
            effective_date: Some(date(2025, 4, 30)),
            ..TransitionInput::to(Left)
        };

        assert!(matches!(
            plan_transition(&member, &input, today()),
            Err(TransitionError::BeforeLastChange { .. })
        ));
    }

    #[test]
    fn test_backdated_before_open_period_rejected() {
        let mut member = holding(Active, Uuid::new_v4(), date(2025, 5, 1));
        member.last_effective_date = Some(date(2025, 4, 1));
        let input = TransitionInput {
            effective_date: Some(date(2025, 4, 15)),
            ..TransitionInput::to(Left)
        };

        assert!(matches!(
            plan_transition(&member, &input, today()),
            Err(TransitionError::BeforeOpenPeriod { .. })
        ));
    }

    #[test]
    fn test_clamp_moves_effective_date_forward() {
        let mut member = holding(Suspended, Uuid::new_v4(), date(2025, 1, 1));
        member.last_effective_date = Some(date(2025, 6, 3));
        let input = TransitionInput {
            effective_date: Some(date(2025, 6, 1)),
            clamp_to_history: true,
            ..TransitionInput::to(Left)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert_eq!(plan.effective_date, date(2025, 6, 3));
        assert_eq!(plan.close_period.unwrap().end_date, date(2025, 6, 3));
    }

    #[test]
    fn test_reactivation_with_new_type_rotates_period() {
        let old_type = Uuid::new_v4();
        let member = holding(Dormant, old_type, date(2024, 1, 1));
        let new_type = type_info(None);
        let input = TransitionInput {
            requested_type: Some(new_type),
            current_type: Some(TypeInfo {
                id: old_type,
                probation_days: None,
            }),
            ..TransitionInput::to(Active)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert!(plan.close_period.is_some());
        assert_eq!(plan.open_period.unwrap().membership_type_id, new_type.id);
        assert_eq!(plan.fields.joined_on, Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_new_member_can_be_activated_retroactively() {
        let membership = type_info(None);
        let input = TransitionInput {
            requested_type: Some(membership),
            effective_date: Some(date(2025, 6, 1)),
            ..TransitionInput::to(Active)
        };

        let plan = plan_transition(&pending(), &input, today()).unwrap();

        assert_eq!(plan.effective_date, date(2025, 6, 1));
        assert_eq!(plan.fields.joined_on, Some(date(2025, 6, 1)));
        assert_eq!(plan.open_period.unwrap().start_date, date(2025, 6, 1));
    }

    #[test]
    fn test_type_change_after_probation_end_keeps_end_date() {
        let mut member = holding(Probation, Uuid::new_v4(), date(2025, 3, 1));
        member.probation_ends_on = Some(date(2025, 6, 1));
        let input = TransitionInput {
            requested_type: Some(type_info(Some(30))),
            ..TransitionInput::to(Probation)
        };

        let plan = plan_transition(&member, &input, today()).unwrap();

        assert_eq!(plan.fields.probation_ends_on, Some(date(2025, 6, 1)));
        assert!(plan.open_period.is_some());
    }
}

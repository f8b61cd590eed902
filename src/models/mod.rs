// Models module - Database entity representations

pub mod club;
pub mod club_user;
pub mod household;
pub mod member;
pub mod member_status_transition;
pub mod membership_period;
pub mod membership_type;
pub mod user;

pub use club::Club;
pub use club_user::{ClubRole, ClubUser};
pub use household::Household;
pub use member::{Member, MemberStatus};
pub use member_status_transition::MemberStatusTransition;
pub use membership_period::MembershipPeriod;
pub use membership_type::MembershipType;
pub use user::User;

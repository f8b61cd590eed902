// Services module - Business logic

pub mod access_token;
pub mod member_status;
pub mod permissions;
pub mod status_machine;

pub use member_status::{Actor, MemberStatusService, TransitionRequest};

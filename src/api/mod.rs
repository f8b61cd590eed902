// API module - HTTP endpoints

pub mod auth;
pub mod club_users;
pub mod clubs;
pub mod health;
pub mod households;
pub mod members;
pub mod membership_types;
pub mod middleware;
pub mod users;
pub mod validation;

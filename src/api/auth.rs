use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::{
    auth::get_authenticated_user,
    session::{AppState, SESSION_KEY_SESSION_STARTED_AT, SESSION_KEY_USER_ID},
};
use crate::error::{AppError, Result};
use crate::models::{club_user::ClubRole, Club, ClubUser, User};
use crate::services::access_token;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    access_token: String,
}

#[derive(Debug, Serialize)]
struct ClubMembership {
    club: Club,
    role: Option<ClubRole>,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user: User,
    clubs: Vec<ClubMembership>,
}

/// Exchanges an access token for a session cookie
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = User::find_by_email(&state.pool, body.email.trim())
        .await?
        .filter(|u| !u.is_system)
        .ok_or(AppError::Unauthorized)?;

    let valid = user
        .access_token_hash
        .as_deref()
        .map_or(false, |hash| access_token::verify(&body.access_token, hash));

    if !valid {
        tracing::warn!(user_id = %user.id, "Login rejected: invalid access token");
        return Err(AppError::Unauthorized);
    }

    // New session id on privilege change
    session.cycle_id().await?;
    session.insert(SESSION_KEY_USER_ID, user.id).await?;
    session
        .insert(SESSION_KEY_SESSION_STARTED_AT, Utc::now().to_rfc3339())
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(user))
}

async fn logout(session: Session) -> Result<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, session: Session) -> Result<Json<MeResponse>> {
    let user = get_authenticated_user(&state.pool, &session).await?;

    let clubs = Club::list_for_user(&state.pool, user.id).await?;
    let mut memberships = Vec::with_capacity(clubs.len());
    for club in clubs {
        let role = ClubUser::find_role(&state.pool, club.id, user.id).await?;
        memberships.push(ClubMembership { club, role });
    }

    Ok(Json(MeResponse {
        user,
        clubs: memberships,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

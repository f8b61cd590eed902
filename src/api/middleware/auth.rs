use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use super::session::SESSION_KEY_USER_ID;
use crate::error::{AppError, Result};
use crate::models::User;

/// Middleware that requires the user to be authenticated
pub async fn require_auth(session: Session, request: Request, next: Next) -> Result<Response> {
    let user_id: Option<Uuid> = session.get(SESSION_KEY_USER_ID).await?;

    if user_id.is_none() {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Loads the signed-in user from the session
pub async fn get_authenticated_user(pool: &PgPool, session: &Session) -> Result<User> {
    let user_id: Uuid = session
        .get(SESSION_KEY_USER_ID)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let user = User::find_by_id(pool, user_id)
        .await?
        .filter(|u| !u.is_system)
        .ok_or(AppError::Unauthorized)?;

    Ok(user)
}

pub fn require_super_admin(user: &User) -> Result<()> {
    if user.is_super_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

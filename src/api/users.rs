use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::{
    auth::{get_authenticated_user, require_super_admin},
    session::AppState,
};
use crate::api::validation;
use crate::error::{AppError, Result};
use crate::models::{user::CreateUserData, User};
use crate::services::access_token;

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    email: String,
    display_name: String,
    #[serde(default)]
    is_super_admin: bool,
}

/// The plain access token is only ever returned here
#[derive(Debug, Serialize)]
struct CreatedUser {
    user: User,
    access_token: String,
}

async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUser>)> {
    let actor = get_authenticated_user(&state.pool, &session).await?;
    require_super_admin(&actor)?;

    let email = validation::email(&body.email)?;
    if email.eq_ignore_ascii_case(&state.config.system_user_email) {
        return Err(AppError::Validation(
            "This email is reserved for the system user".to_string(),
        ));
    }

    let token = access_token::generate().map_err(|e| AppError::Internal(e.into()))?;

    let user = User::create(
        &state.pool,
        CreateUserData {
            email,
            display_name: validation::required("Display name", &body.display_name)?,
            access_token_hash: access_token::hash(&token),
            is_super_admin: body.is_super_admin,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, created_by = %actor.id, "Created user");

    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            user,
            access_token: token,
        }),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users", post(create_user))
}

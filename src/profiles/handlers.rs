use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{ChangePasswordRequest, Profile, UpdateProfileRequest};
use crate::{
    auth::{
        dto::MessageResponse,
        extractors::AuthUser,
        repo_types::User,
        services::{hash_password, verify_password, MIN_PASSWORD_LEN},
    },
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_profile))
        .route("/me/profile", put(update_profile))
        .route("/me/password", put(change_password))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Profile>> {
    let profile = Profile::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let payload = payload.normalize()?;
    let profile = Profile::update(&state.db, auth.id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(user_id = %auth.id, "profile updated");
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidArgument("Password too short".into()));
    }

    let user = User::find_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        warn!(user_id = %auth.id, "password change with wrong old password");
        return Err(AppError::InvalidArgument("Old password is invalid".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password_hash(&state.db, auth.id, &hash).await?;
    info!(user_id = %auth.id, "password changed");
    Ok(Json(MessageResponse::new("Password updated")))
}

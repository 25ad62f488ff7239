use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo;
use crate::{
    auth::{dto::PublicUser, extractors::AuthUser},
    error::{AppError, AppResult},
    extract::ApiPath,
    state::AppState,
};

/// Admin-only user management. The flag reaches a user's token on their next login or refresh.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/admins", get(list_admins))
        .route("/admin/users/:id/admin", put(grant_admin).delete(revoke_admin))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    auth.ensure_admin()?;
    Ok(Json(repo::list_users(&state.db, false).await?))
}

#[instrument(skip(state))]
pub async fn list_admins(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    auth.ensure_admin()?;
    Ok(Json(repo::list_users(&state.db, true).await?))
}

#[instrument(skip(state))]
pub async fn grant_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<PublicUser>> {
    set_flag(&state, auth, id, true).await
}

#[instrument(skip(state))]
pub async fn revoke_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<PublicUser>> {
    set_flag(&state, auth, id, false).await
}

async fn set_flag(
    state: &AppState,
    auth: AuthUser,
    id: Uuid,
    is_admin: bool,
) -> AppResult<Json<PublicUser>> {
    auth.ensure_admin()?;
    let user = repo::set_admin(&state.db, id, is_admin)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(by = %auth.id, user_id = %id, is_admin, "admin flag changed");
    Ok(Json(user))
}

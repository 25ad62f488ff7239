use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ConnectionEntry, HistoryEntry, RequestEntry, SearchParams},
    repo_types::{Suggestion, UserCard, UserSearch},
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::AppResult,
    extract::{ApiPath, ApiQuery},
    state::AppState,
};

// --- public routers ---

/// Transitions, where `:id` is the other party. The accepted listing shares their path.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/:id/conexoes",
            get(list_accepted).post(send_request).delete(cancel_request),
        )
        .route("/users/:id/conexoes/aceitar", put(accept))
        .route("/users/:id/conexoes/recusar", put(refuse))
        .route("/users/:id/conexoes/bloquear", put(block))
        .route("/users/:id/conexoes/desfazer", delete(undo))
}

/// Listings; `:id` is the subject.
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id/conexoes/pendentes", get(list_pending))
        .route("/users/:id/conexoes/enviadas", get(list_sent))
        .route("/users/:id/conexoes/historico", get(history))
        .route("/users/:id/sugestoes", get(suggestions))
        .route("/search/users", get(search_users))
}

// --- transitions ---

#[instrument(skip(state))]
pub async fn send_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(target): ApiPath<Uuid>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    state.connections.request(auth.id, target).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Connection request sent")),
    ))
}

#[instrument(skip(state))]
pub async fn cancel_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(target): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.connections.cancel(auth.id, target).await?;
    Ok(Json(MessageResponse::new("Connection request cancelled")))
}

#[instrument(skip(state))]
pub async fn accept(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(requester): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.connections.accept(auth.id, requester).await?;
    Ok(Json(MessageResponse::new("Connection accepted")))
}

#[instrument(skip(state))]
pub async fn refuse(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(requester): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.connections.refuse(auth.id, requester).await?;
    Ok(Json(MessageResponse::new("Connection refused")))
}

#[instrument(skip(state))]
pub async fn block(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(target): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.connections.block(auth.id, target).await?;
    Ok(Json(MessageResponse::new("Connection blocked")))
}

#[instrument(skip(state))]
pub async fn undo(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(other): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.connections.undo(auth.id, other).await?;
    Ok(Json(MessageResponse::new("Connection removed")))
}

// --- listings ---

#[instrument(skip(state))]
pub async fn list_accepted(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(subject): ApiPath<Uuid>,
) -> AppResult<Json<Vec<ConnectionEntry>>> {
    auth.ensure_can_view(subject)?;
    Ok(Json(state.connections.list_accepted(subject).await?))
}

#[instrument(skip(state))]
pub async fn list_pending(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(subject): ApiPath<Uuid>,
) -> AppResult<Json<Vec<RequestEntry>>> {
    auth.ensure_can_view(subject)?;
    Ok(Json(state.connections.list_pending(subject).await?))
}

#[instrument(skip(state))]
pub async fn list_sent(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(subject): ApiPath<Uuid>,
) -> AppResult<Json<Vec<RequestEntry>>> {
    auth.ensure_can_view(subject)?;
    Ok(Json(state.connections.list_sent(subject).await?))
}

#[instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(subject): ApiPath<Uuid>,
) -> AppResult<Json<Vec<HistoryEntry>>> {
    auth.ensure_can_view(subject)?;
    Ok(Json(state.connections.history(subject).await?))
}

#[instrument(skip(state))]
pub async fn suggestions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(subject): ApiPath<Uuid>,
) -> AppResult<Json<Vec<Suggestion>>> {
    auth.ensure_can_view(subject)?;
    Ok(Json(state.connections.suggestions(subject).await?))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> AppResult<Json<Vec<UserCard>>> {
    let query = UserSearch::from(params);
    Ok(Json(state.connections.search(auth.id, &query).await?))
}

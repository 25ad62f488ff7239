use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ConnectionEntry, Direction, HistoryEntry, RequestEntry},
    events::{AuditEntry, ConnectionEvents, Notice},
    repo::{ConnectionRepo, WriteOutcome},
    repo_types::{Connection, ConnectionStatus, Suggestion, UserCard, UserSearch},
};
use crate::error::{AppError, AppResult};

/// Owns the connection state machine and everything derived from it.
#[derive(Clone)]
pub struct ConnectionService {
    repo: Arc<dyn ConnectionRepo>,
    events: Arc<dyn ConnectionEvents>,
    suggestion_limit: i64,
}

fn ensure_distinct(actor: Uuid, other: Uuid) -> AppResult<()> {
    if actor == other {
        return Err(AppError::InvalidArgument(
            "A user cannot connect with themselves".into(),
        ));
    }
    Ok(())
}

fn existing_conflict(status: ConnectionStatus) -> AppError {
    let msg = match status {
        ConnectionStatus::Accepted => "You are already connected with this user",
        ConnectionStatus::Pending => "A connection request is already pending",
        ConnectionStatus::Refused => "The connection was previously refused",
        ConnectionStatus::Blocked => "The connection is blocked",
    };
    AppError::Conflict(msg.into())
}

impl ConnectionService {
    pub fn new(
        repo: Arc<dyn ConnectionRepo>,
        events: Arc<dyn ConnectionEvents>,
        suggestion_limit: i64,
    ) -> Self {
        Self {
            repo,
            events,
            suggestion_limit,
        }
    }

    /// NONE -> PENDING, requester -> target.
    pub async fn request(&self, requester: Uuid, target: Uuid) -> AppResult<Connection> {
        ensure_distinct(requester, target)?;

        if let Some(existing) = self.repo.find_between(requester, target).await? {
            return Err(existing_conflict(existing.status));
        }

        match self.repo.insert_pending(requester, target).await? {
            WriteOutcome::Written(conn) => {
                info!(%requester, %target, connection_id = %conn.id, "connection requested");
                Ok(conn)
            }
            WriteOutcome::UnknownUser => Err(AppError::NotFound("User not found".into())),
            // Lost a race with another writer on the same pair.
            WriteOutcome::PairTaken => {
                let status = self
                    .repo
                    .find_between(requester, target)
                    .await?
                    .map_or(ConnectionStatus::Pending, |c| c.status);
                Err(existing_conflict(status))
            }
        }
    }

    /// PENDING(requester -> actor) -> ACCEPTED, then best-effort audit and notification.
    pub async fn accept(&self, actor: Uuid, requester: Uuid) -> AppResult<Connection> {
        ensure_distinct(actor, requester)?;

        let existing = self
            .repo
            .find_directed(requester, actor)
            .await?
            .ok_or_else(|| AppError::NotFound("Connection request not found".into()))?;

        match existing.status {
            ConnectionStatus::Pending => {}
            ConnectionStatus::Accepted => {
                return Err(AppError::Conflict("Connection was already accepted".into()))
            }
            ConnectionStatus::Refused => {
                return Err(AppError::Conflict("Connection was previously refused".into()))
            }
            ConnectionStatus::Blocked => {
                return Err(AppError::Conflict("Invalid request state".into()))
            }
        }

        let conn = self
            .repo
            .update_status(
                requester,
                actor,
                ConnectionStatus::Pending,
                ConnectionStatus::Accepted,
            )
            .await?
            .ok_or_else(|| AppError::Conflict("Connection request is no longer pending".into()))?;

        info!(%actor, %requester, connection_id = %conn.id, "connection accepted");
        self.after_accept(&conn, actor).await;
        Ok(conn)
    }

    async fn after_accept(&self, conn: &Connection, actor: Uuid) {
        let entry = AuditEntry {
            connection_id: conn.id,
            actor_id: actor,
            action: "accepted",
        };
        if let Err(e) = self.events.audit(entry).await {
            warn!(error = ?e, connection_id = %conn.id, "audit entry failed");
        }
        let notice = Notice::ConnectionAccepted { by: actor };
        if let Err(e) = self.events.notify(conn.requester_id, notice).await {
            warn!(error = ?e, user_id = %conn.requester_id, "accept notification failed");
        }
    }

    /// PENDING(requester -> actor) -> REFUSED. No matching row is not an error.
    pub async fn refuse(&self, actor: Uuid, requester: Uuid) -> AppResult<()> {
        ensure_distinct(actor, requester)?;
        let updated = self
            .repo
            .update_status(
                requester,
                actor,
                ConnectionStatus::Pending,
                ConnectionStatus::Refused,
            )
            .await?;
        info!(%actor, %requester, applied = updated.is_some(), "connection refused");
        Ok(())
    }

    /// any -> BLOCKED(actor -> target).
    pub async fn block(&self, actor: Uuid, target: Uuid) -> AppResult<Connection> {
        ensure_distinct(actor, target)?;
        match self.repo.upsert_blocked(actor, target).await? {
            WriteOutcome::Written(conn) => {
                info!(%actor, %target, connection_id = %conn.id, "connection blocked");
                Ok(conn)
            }
            WriteOutcome::UnknownUser => Err(AppError::NotFound("User not found".into())),
            WriteOutcome::PairTaken => Err(AppError::Storage(anyhow::anyhow!(
                "block upsert reported a pair conflict"
            ))),
        }
    }

    /// PENDING(actor -> target) -> NONE. No matching row is not an error.
    pub async fn cancel(&self, actor: Uuid, target: Uuid) -> AppResult<()> {
        ensure_distinct(actor, target)?;
        let deleted = self
            .repo
            .delete_directed(actor, target, ConnectionStatus::Pending)
            .await?;
        info!(%actor, %target, deleted, "connection request cancelled");
        Ok(())
    }

    /// Removes the pair's row whatever its status.
    pub async fn undo(&self, actor: Uuid, other: Uuid) -> AppResult<()> {
        ensure_distinct(actor, other)?;
        let deleted = self.repo.delete_pair(actor, other).await?;
        info!(%actor, %other, deleted, "connection undone");
        Ok(())
    }

    async fn cards_by_id(&self, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, UserCard>> {
        let cards = self.repo.user_cards(&ids).await?;
        Ok(cards.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Accepted connections of `user`, one entry per counterpart.
    pub async fn list_accepted(&self, user: Uuid) -> AppResult<Vec<ConnectionEntry>> {
        let rows = self
            .repo
            .list_involving(user, Some(ConnectionStatus::Accepted))
            .await?;

        let mut seen = HashSet::new();
        let pairs: Vec<(Connection, Uuid)> = rows
            .into_iter()
            .filter_map(|c| c.counterpart_of(user).map(|other| (c, other)))
            .filter(|(_, other)| seen.insert(*other))
            .collect();

        let mut cards = self
            .cards_by_id(pairs.iter().map(|(_, other)| *other).collect())
            .await?;

        Ok(pairs
            .into_iter()
            .filter_map(|(c, other)| {
                cards.remove(&other).map(|user| ConnectionEntry {
                    connection_id: c.id,
                    user,
                    since: c.updated_at,
                })
            })
            .collect())
    }

    /// Pending requests addressed to `user`.
    pub async fn list_pending(&self, user: Uuid) -> AppResult<Vec<RequestEntry>> {
        self.list_requests(user, Direction::Received).await
    }

    /// Pending requests sent by `user`.
    pub async fn list_sent(&self, user: Uuid) -> AppResult<Vec<RequestEntry>> {
        self.list_requests(user, Direction::Sent).await
    }

    async fn list_requests(&self, user: Uuid, direction: Direction) -> AppResult<Vec<RequestEntry>> {
        let rows: Vec<Connection> = self
            .repo
            .list_involving(user, Some(ConnectionStatus::Pending))
            .await?
            .into_iter()
            .filter(|c| match direction {
                Direction::Sent => c.requester_id == user,
                Direction::Received => c.addressee_id == user,
            })
            .collect();

        let cards = self
            .cards_by_id(rows.iter().filter_map(|c| c.counterpart_of(user)).collect())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|c| {
                let card = c.counterpart_of(user).and_then(|id| cards.get(&id))?;
                Some(RequestEntry {
                    user: card.clone(),
                    requested_at: c.created_at,
                })
            })
            .collect())
    }

    /// Every row involving `user`, any status.
    pub async fn history(&self, user: Uuid) -> AppResult<Vec<HistoryEntry>> {
        let rows = self.repo.list_involving(user, None).await?;
        Ok(rows
            .into_iter()
            .filter_map(|c| {
                let counterpart_id = c.counterpart_of(user)?;
                let direction = if c.requester_id == user {
                    Direction::Sent
                } else {
                    Direction::Received
                };
                Some(HistoryEntry {
                    connection_id: c.id,
                    counterpart_id,
                    direction,
                    status: c.status,
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                })
            })
            .collect())
    }

    /// `user` plus everyone they have a row with, whatever its status.
    /// A refused or blocked pair stays hidden from discovery.
    pub async fn excluded_ids(&self, user: Uuid) -> AppResult<HashSet<Uuid>> {
        let rows = self.repo.list_involving(user, None).await?;
        let mut ids: HashSet<Uuid> = rows.iter().filter_map(|c| c.counterpart_of(user)).collect();
        ids.insert(user);
        Ok(ids)
    }

    pub async fn suggestions(&self, user: Uuid) -> AppResult<Vec<Suggestion>> {
        let seed = self
            .repo
            .suggestion_seed(user)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let excluded: Vec<Uuid> = self.excluded_ids(user).await?.into_iter().collect();
        let ranked = self
            .repo
            .rank_suggestions(&seed, &excluded, self.suggestion_limit)
            .await?;
        Ok(ranked)
    }

    pub async fn search(&self, user: Uuid, query: &UserSearch) -> AppResult<Vec<UserCard>> {
        if query.is_empty() {
            return Err(AppError::InvalidArgument(
                "At least one filter (name, course or interests) is required".into(),
            ));
        }
        let excluded: Vec<Uuid> = self.excluded_ids(user).await?.into_iter().collect();
        let found = self.repo.search_users(query, &excluded).await?;
        Ok(found)
    }
}

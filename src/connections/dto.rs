use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{ConnectionStatus, UserCard, UserSearch};

/// An accepted connection, seen from the caller's side.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEntry {
    pub connection_id: Uuid,
    #[serde(flatten)]
    pub user: UserCard,
    #[serde(with = "time::serde::rfc3339")]
    pub since: OffsetDateTime,
}

/// A pending request, incoming or outgoing.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEntry {
    #[serde(flatten)]
    pub user: UserCard,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub connection_id: Uuid,
    pub counterpart_id: Uuid,
    pub direction: Direction,
    pub status: ConnectionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// `GET /search/users?name=&course=&interests=a,b`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub course: Option<String>,
    pub interests: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<SearchParams> for UserSearch {
    fn from(p: SearchParams) -> Self {
        let interests = p
            .interests
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            name: non_blank(p.name),
            course: non_blank(p.course),
            interests,
        }
    }
}

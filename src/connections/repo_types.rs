use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Refused,
    Blocked,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Refused => "refused",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "refused" => Ok(Self::Refused),
            "blocked" => Ok(Self::Blocked),
            other => anyhow::bail!("unknown connection status {other:?}"),
        }
    }
}

/// Unordered pair of user ids, stored as (low, high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub low: Uuid,
    pub high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}

/// One relationship between two users. The requester is whoever created the
/// current state (sent the request, or blocked).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: ConnectionStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Connection {
    /// The other party, seen from `user_id`.
    pub fn counterpart_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.requester_id == user_id {
            Some(self.addressee_id)
        } else if self.addressee_id == user_id {
            Some(self.requester_id)
        } else {
            None
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ConnectionRow {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ConnectionRow> for Connection {
    type Error = anyhow::Error;

    fn try_from(r: ConnectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            requester_id: r.requester_id,
            addressee_id: r.addressee_id,
            status: r.status.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Public slice of a user shown next to a connection, in search results and suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserCard {
    pub id: Uuid,
    pub name: String,
    pub course: Option<String>,
    pub semester: Option<i32>,
    pub interests: Vec<String>,
}

/// What the suggestion ranking needs to know about the caller.
#[derive(Debug, Clone, FromRow)]
pub struct SuggestionSeed {
    pub course: Option<String>,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Suggestion {
    pub id: Uuid,
    pub name: String,
    pub course: Option<String>,
    pub semester: Option<i32>,
    pub interests: Vec<String>,
    pub score: i32,
}

/// Filters for user search; at least one must be set.
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    pub name: Option<String>,
    pub course: Option<String>,
    pub interests: Vec<String>,
}

impl UserSearch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.course.is_none() && self.interests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_names() {
        for s in [
            ConnectionStatus::Pending,
            ConnectionStatus::Accepted,
            ConnectionStatus::Refused,
            ConnectionStatus::Blocked,
        ] {
            assert_eq!(s.as_str().parse::<ConnectionStatus>().unwrap(), s);
        }
        assert!("aceito".parse::<ConnectionStatus>().is_err());
    }

    #[test]
    fn pair_key_ignores_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        let key = PairKey::new(a, b);
        assert!(key.low <= key.high);
    }

    #[test]
    fn counterpart_is_seen_from_either_side() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let c = Connection {
            id: Uuid::new_v4(),
            requester_id: a,
            addressee_id: b,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(c.counterpart_of(a), Some(b));
        assert_eq!(c.counterpart_of(b), Some(a));
        assert_eq!(c.counterpart_of(Uuid::new_v4()), None);
    }
}

//! In-process stand-ins for the Postgres repository and event sink.
//! Rows follow the same pair-key rules as the `connections` table.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    events::{AuditEntry, ConnectionEvents, Notice},
    repo::{ConnectionRepo, WriteOutcome, SEARCH_LIMIT},
    repo_types::{
        Connection, ConnectionStatus, PairKey, Suggestion, SuggestionSeed, UserCard, UserSearch,
    },
};

fn pair_of(c: &Connection) -> PairKey {
    PairKey::new(c.requester_id, c.addressee_id)
}

#[derive(Default)]
pub struct MemoryConnectionRepo {
    users: Mutex<Vec<UserCard>>,
    rows: Mutex<Vec<Connection>>,
}

impl MemoryConnectionRepo {
    pub fn add_user(&self, name: &str, course: Option<&str>, interests: &[&str]) -> Uuid {
        let id = Uuid::new_v4();
        self.users.lock().unwrap().push(UserCard {
            id,
            name: name.to_string(),
            course: course.map(str::to_string),
            semester: Some(1),
            interests: interests.iter().map(|s| s.to_string()).collect(),
        });
        id
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn user_exists(&self, id: Uuid) -> bool {
        self.users.lock().unwrap().iter().any(|u| u.id == id)
    }
}

#[async_trait]
impl ConnectionRepo for MemoryConnectionRepo {
    async fn find_between(&self, a: Uuid, b: Uuid) -> anyhow::Result<Option<Connection>> {
        let key = PairKey::new(a, b);
        Ok(self.rows.lock().unwrap().iter().find(|c| pair_of(c) == key).cloned())
    }

    async fn find_directed(
        &self,
        requester: Uuid,
        addressee: Uuid,
    ) -> anyhow::Result<Option<Connection>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.requester_id == requester && c.addressee_id == addressee)
            .cloned())
    }

    async fn insert_pending(&self, requester: Uuid, addressee: Uuid) -> anyhow::Result<WriteOutcome> {
        if !self.user_exists(requester) || !self.user_exists(addressee) {
            return Ok(WriteOutcome::UnknownUser);
        }
        let mut rows = self.rows.lock().unwrap();
        let key = PairKey::new(requester, addressee);
        if rows.iter().any(|c| pair_of(c) == key) {
            return Ok(WriteOutcome::PairTaken);
        }
        let now = OffsetDateTime::now_utc();
        let conn = Connection {
            id: Uuid::new_v4(),
            requester_id: requester,
            addressee_id: addressee,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        rows.push(conn.clone());
        Ok(WriteOutcome::Written(conn))
    }

    async fn update_status(
        &self,
        requester: Uuid,
        addressee: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> anyhow::Result<Option<Connection>> {
        let mut rows = self.rows.lock().unwrap();
        let found = rows.iter_mut().find(|c| {
            c.requester_id == requester && c.addressee_id == addressee && c.status == from
        });
        Ok(found.map(|c| {
            c.status = to;
            c.updated_at = OffsetDateTime::now_utc();
            c.clone()
        }))
    }

    async fn upsert_blocked(&self, actor: Uuid, target: Uuid) -> anyhow::Result<WriteOutcome> {
        if !self.user_exists(actor) || !self.user_exists(target) {
            return Ok(WriteOutcome::UnknownUser);
        }
        let mut rows = self.rows.lock().unwrap();
        let key = PairKey::new(actor, target);
        let now = OffsetDateTime::now_utc();
        if let Some(c) = rows.iter_mut().find(|c| pair_of(c) == key) {
            c.requester_id = actor;
            c.addressee_id = target;
            c.status = ConnectionStatus::Blocked;
            c.updated_at = now;
            return Ok(WriteOutcome::Written(c.clone()));
        }
        let conn = Connection {
            id: Uuid::new_v4(),
            requester_id: actor,
            addressee_id: target,
            status: ConnectionStatus::Blocked,
            created_at: now,
            updated_at: now,
        };
        rows.push(conn.clone());
        Ok(WriteOutcome::Written(conn))
    }

    async fn delete_directed(
        &self,
        requester: Uuid,
        addressee: Uuid,
        status: ConnectionStatus,
    ) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|c| {
            !(c.requester_id == requester && c.addressee_id == addressee && c.status == status)
        });
        Ok((before - rows.len()) as u64)
    }

    async fn delete_pair(&self, a: Uuid, b: Uuid) -> anyhow::Result<u64> {
        let key = PairKey::new(a, b);
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|c| pair_of(c) != key);
        Ok((before - rows.len()) as u64)
    }

    async fn list_involving(
        &self,
        user: Uuid,
        status: Option<ConnectionStatus>,
    ) -> anyhow::Result<Vec<Connection>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.counterpart_of(user).is_some() && status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }

    async fn user_cards(&self, ids: &[Uuid]) -> anyhow::Result<Vec<UserCard>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn suggestion_seed(&self, user: Uuid) -> anyhow::Result<Option<SuggestionSeed>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user)
            .map(|u| SuggestionSeed {
                course: u.course.clone(),
                interests: u.interests.clone(),
            }))
    }

    async fn rank_suggestions(
        &self,
        seed: &SuggestionSeed,
        excluded: &[Uuid],
        limit: i64,
    ) -> anyhow::Result<Vec<Suggestion>> {
        let mut ranked: Vec<Suggestion> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !excluded.contains(&u.id))
            .map(|u| {
                let course = match (&seed.course, &u.course) {
                    (Some(mine), Some(theirs)) if mine == theirs => 2,
                    _ => 0,
                };
                let shared = u
                    .interests
                    .iter()
                    .filter(|i| seed.interests.contains(i))
                    .count() as i32;
                Suggestion {
                    id: u.id,
                    name: u.name.clone(),
                    course: u.course.clone(),
                    semester: u.semester,
                    interests: u.interests.clone(),
                    score: course + shared,
                }
            })
            .filter(|s| s.score > 0)
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ranked)
    }

    async fn search_users(
        &self,
        query: &UserSearch,
        excluded: &[Uuid],
    ) -> anyhow::Result<Vec<UserCard>> {
        let needle = query.name.as_ref().map(|n| n.to_lowercase());
        let mut found: Vec<UserCard> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !excluded.contains(&u.id))
            .filter(|u| {
                needle
                    .as_ref()
                    .map_or(true, |n| u.name.to_lowercase().contains(n))
                    && query.course.as_ref().map_or(true, |c| u.course.as_ref() == Some(c))
                    && (query.interests.is_empty()
                        || u.interests.iter().any(|i| query.interests.contains(i)))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(SEARCH_LIMIT as usize);
        Ok(found)
    }
}

/// Keeps every side effect it is handed; can be switched to fail them all.
#[derive(Default)]
pub struct RecordingEvents {
    audits: Mutex<Vec<AuditEntry>>,
    notices: Mutex<Vec<(Uuid, Notice)>>,
    failing: AtomicBool,
}

impl RecordingEvents {
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn audits(&self) -> Vec<AuditEntry> {
        self.audits.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<(Uuid, Notice)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionEvents for RecordingEvents {
    async fn audit(&self, entry: AuditEntry) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("audit sink unavailable");
        }
        self.audits.lock().unwrap().push(entry);
        Ok(())
    }

    async fn notify(&self, user_id: Uuid, notice: Notice) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("notification sink unavailable");
        }
        self.notices.lock().unwrap().push((user_id, notice));
        Ok(())
    }
}

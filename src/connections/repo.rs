use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{
    Connection, ConnectionRow, ConnectionStatus, PairKey, Suggestion, SuggestionSeed, UserCard,
    UserSearch,
};

/// Result of a write that may hit the pair key or a missing user.
#[derive(Debug)]
pub enum WriteOutcome {
    Written(Connection),
    /// The pair already has a row.
    PairTaken,
    /// One of the ids does not reference a user.
    UnknownUser,
}

/// Storage for connections and the user slices the connection features read.
#[async_trait]
pub trait ConnectionRepo: Send + Sync {
    /// Row for the unordered pair, if any.
    async fn find_between(&self, a: Uuid, b: Uuid) -> anyhow::Result<Option<Connection>>;

    async fn find_directed(
        &self,
        requester: Uuid,
        addressee: Uuid,
    ) -> anyhow::Result<Option<Connection>>;

    async fn insert_pending(&self, requester: Uuid, addressee: Uuid) -> anyhow::Result<WriteOutcome>;

    /// Moves the directed row from `from` to `to` in one statement. `None` when no row matched.
    async fn update_status(
        &self,
        requester: Uuid,
        addressee: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> anyhow::Result<Option<Connection>>;

    /// Marks the pair blocked by `actor`, creating the row if needed. Never returns `PairTaken`.
    async fn upsert_blocked(&self, actor: Uuid, target: Uuid) -> anyhow::Result<WriteOutcome>;

    async fn delete_directed(
        &self,
        requester: Uuid,
        addressee: Uuid,
        status: ConnectionStatus,
    ) -> anyhow::Result<u64>;

    async fn delete_pair(&self, a: Uuid, b: Uuid) -> anyhow::Result<u64>;

    /// Rows where `user` is either party, optionally filtered by status.
    async fn list_involving(
        &self,
        user: Uuid,
        status: Option<ConnectionStatus>,
    ) -> anyhow::Result<Vec<Connection>>;

    async fn user_cards(&self, ids: &[Uuid]) -> anyhow::Result<Vec<UserCard>>;

    async fn suggestion_seed(&self, user: Uuid) -> anyhow::Result<Option<SuggestionSeed>>;

    async fn rank_suggestions(
        &self,
        seed: &SuggestionSeed,
        excluded: &[Uuid],
        limit: i64,
    ) -> anyhow::Result<Vec<Suggestion>>;

    /// Users matching `query`, skipping `excluded`, ordered by name and capped at [`SEARCH_LIMIT`].
    async fn search_users(
        &self,
        query: &UserSearch,
        excluded: &[Uuid],
    ) -> anyhow::Result<Vec<UserCard>>;
}

const CONNECTION_COLUMNS: &str =
    "id, requester_id, addressee_id, status, created_at, updated_at";

pub const SEARCH_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct PgConnectionRepo {
    db: PgPool,
}

impl PgConnectionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_connections(rows: Vec<ConnectionRow>) -> anyhow::Result<Vec<Connection>> {
    rows.into_iter().map(Connection::try_from).collect()
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl ConnectionRepo for PgConnectionRepo {
    async fn find_between(&self, a: Uuid, b: Uuid) -> anyhow::Result<Option<Connection>> {
        let key = PairKey::new(a, b);
        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE pair_low = $1 AND pair_high = $2"
        ))
        .bind(key.low)
        .bind(key.high)
        .fetch_optional(&self.db)
        .await
        .context("find connection by pair")?;
        row.map(Connection::try_from).transpose()
    }

    async fn find_directed(
        &self,
        requester: Uuid,
        addressee: Uuid,
    ) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE requester_id = $1 AND addressee_id = $2"
        ))
        .bind(requester)
        .bind(addressee)
        .fetch_optional(&self.db)
        .await
        .context("find directed connection")?;
        row.map(Connection::try_from).transpose()
    }

    async fn insert_pending(&self, requester: Uuid, addressee: Uuid) -> anyhow::Result<WriteOutcome> {
        let res = sqlx::query_as::<_, ConnectionRow>(&format!(
            r#"
            INSERT INTO connections (requester_id, addressee_id, status)
            VALUES ($1, $2, 'pending')
            ON CONFLICT ON CONSTRAINT connections_pair_key DO NOTHING
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(requester)
        .bind(addressee)
        .fetch_optional(&self.db)
        .await;

        match res {
            Ok(Some(row)) => Ok(WriteOutcome::Written(row.try_into()?)),
            Ok(None) => Ok(WriteOutcome::PairTaken),
            Err(e) if is_foreign_key_violation(&e) => Ok(WriteOutcome::UnknownUser),
            Err(e) => Err(e).context("insert pending connection"),
        }
    }

    async fn update_status(
        &self,
        requester: Uuid,
        addressee: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            r#"
            UPDATE connections
               SET status = $4, updated_at = now()
             WHERE requester_id = $1 AND addressee_id = $2 AND status = $3
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(requester)
        .bind(addressee)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("update connection {from} -> {to}"))?;
        row.map(Connection::try_from).transpose()
    }

    async fn upsert_blocked(&self, actor: Uuid, target: Uuid) -> anyhow::Result<WriteOutcome> {
        let res = sqlx::query_as::<_, ConnectionRow>(&format!(
            r#"
            INSERT INTO connections (requester_id, addressee_id, status)
            VALUES ($1, $2, 'blocked')
            ON CONFLICT ON CONSTRAINT connections_pair_key DO UPDATE
               SET requester_id = EXCLUDED.requester_id,
                   addressee_id = EXCLUDED.addressee_id,
                   status = 'blocked',
                   updated_at = now()
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(actor)
        .bind(target)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(row) => Ok(WriteOutcome::Written(row.try_into()?)),
            Err(e) if is_foreign_key_violation(&e) => Ok(WriteOutcome::UnknownUser),
            Err(e) => Err(e).context("upsert blocked connection"),
        }
    }

    async fn delete_directed(
        &self,
        requester: Uuid,
        addressee: Uuid,
        status: ConnectionStatus,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "DELETE FROM connections WHERE requester_id = $1 AND addressee_id = $2 AND status = $3",
        )
        .bind(requester)
        .bind(addressee)
        .bind(status.as_str())
        .execute(&self.db)
        .await
        .context("delete directed connection")?;
        Ok(res.rows_affected())
    }

    async fn delete_pair(&self, a: Uuid, b: Uuid) -> anyhow::Result<u64> {
        let key = PairKey::new(a, b);
        let res = sqlx::query("DELETE FROM connections WHERE pair_low = $1 AND pair_high = $2")
            .bind(key.low)
            .bind(key.high)
            .execute(&self.db)
            .await
            .context("delete connection pair")?;
        Ok(res.rows_affected())
    }

    async fn list_involving(
        &self,
        user: Uuid,
        status: Option<ConnectionStatus>,
    ) -> anyhow::Result<Vec<Connection>> {
        let rows = sqlx::query_as::<_, ConnectionRow>(&format!(
            r#"
            SELECT {CONNECTION_COLUMNS}
              FROM connections
             WHERE (requester_id = $1 OR addressee_id = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY updated_at DESC
            "#
        ))
        .bind(user)
        .bind(status.map(ConnectionStatus::as_str))
        .fetch_all(&self.db)
        .await
        .context("list connections involving user")?;
        into_connections(rows)
    }

    async fn user_cards(&self, ids: &[Uuid]) -> anyhow::Result<Vec<UserCard>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cards = sqlx::query_as::<_, UserCard>(
            "SELECT id, name, course, semester, interests FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("load user cards")?;
        Ok(cards)
    }

    async fn suggestion_seed(&self, user: Uuid) -> anyhow::Result<Option<SuggestionSeed>> {
        let seed = sqlx::query_as::<_, SuggestionSeed>(
            "SELECT course, interests FROM users WHERE id = $1",
        )
        .bind(user)
        .fetch_optional(&self.db)
        .await
        .context("load suggestion seed")?;
        Ok(seed)
    }

    async fn rank_suggestions(
        &self,
        seed: &SuggestionSeed,
        excluded: &[Uuid],
        limit: i64,
    ) -> anyhow::Result<Vec<Suggestion>> {
        let rows = sqlx::query_as::<_, Suggestion>(
            r#"
            SELECT id, name, course, semester, interests, score
              FROM get_user_suggestions($1, $2, $3, $4)
            "#,
        )
        .bind(seed.course.as_deref())
        .bind(&seed.interests)
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("get_user_suggestions")?;
        Ok(rows)
    }

    async fn search_users(
        &self,
        query: &UserSearch,
        excluded: &[Uuid],
    ) -> anyhow::Result<Vec<UserCard>> {
        // strpos keeps `%` and `_` literal.
        let cards = sqlx::query_as::<_, UserCard>(
            r#"
            SELECT id, name, course, semester, interests
              FROM users
             WHERE ($1::text IS NULL OR strpos(lower(name), lower($1)) > 0)
               AND ($2::text IS NULL OR course = $2)
               AND (cardinality($3::text[]) = 0 OR interests && $3::text[])
               AND NOT (id = ANY($4))
             ORDER BY name ASC
             LIMIT $5
            "#,
        )
        .bind(query.name.as_deref())
        .bind(query.course.as_deref())
        .bind(&query.interests)
        .bind(excluded)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.db)
        .await
        .context("search users")?;
        Ok(cards)
    }
}

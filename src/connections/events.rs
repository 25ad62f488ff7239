//! Side effects of connection transitions: the audit trail and user notifications.
//!
//! Both are best effort. Callers log failures and carry on.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub connection_id: Uuid,
    pub actor_id: Uuid,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ConnectionAccepted { by: Uuid },
}

impl Notice {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionAccepted { .. } => "connection_accepted",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::ConnectionAccepted { by } => json!({ "user_id": by }),
        }
    }
}

#[async_trait]
pub trait ConnectionEvents: Send + Sync {
    async fn audit(&self, entry: AuditEntry) -> anyhow::Result<()>;
    async fn notify(&self, user_id: Uuid, notice: Notice) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgConnectionEvents {
    db: PgPool,
}

impl PgConnectionEvents {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConnectionEvents for PgConnectionEvents {
    async fn audit(&self, entry: AuditEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO connection_audit (connection_id, actor_id, action) VALUES ($1, $2, $3)",
        )
        .bind(entry.connection_id)
        .bind(entry.actor_id)
        .bind(entry.action)
        .execute(&self.db)
        .await
        .context("insert connection audit")?;
        Ok(())
    }

    async fn notify(&self, user_id: Uuid, notice: Notice) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO notifications (user_id, kind, payload) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(notice.kind())
            .bind(notice.payload())
            .execute(&self.db)
            .await
            .context("insert notification")?;
        Ok(())
    }
}


#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::repo_types::User;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn audit_and_notice_rows_are_written(db: PgPool) {
        let ana = User::create(&db, "Ana", "ana@uni.br", "hash").await.unwrap().unwrap();
        let bia = User::create(&db, "Bia", "bia@uni.br", "hash").await.unwrap().unwrap();
        let events = PgConnectionEvents::new(db.clone());

        events
            .audit(AuditEntry {
                connection_id: Uuid::new_v4(),
                actor_id: bia.id,
                action: "accepted",
            })
            .await
            .unwrap();
        events
            .notify(ana.id, Notice::ConnectionAccepted { by: bia.id })
            .await
            .unwrap();

        let (kind, payload): (String, serde_json::Value) =
            sqlx::query_as("SELECT kind, payload FROM notifications WHERE user_id = $1")
                .bind(ana.id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(kind, "connection_accepted");
        assert_eq!(payload["user_id"], bia.id.to_string());

        // The sink fails loudly; swallowing is the caller's job.
        let err = events
            .notify(Uuid::new_v4(), Notice::ConnectionAccepted { by: bia.id })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("insert notification"));
    }
}

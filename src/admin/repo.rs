use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::dto::PublicUser;

const PUBLIC_COLUMNS: &str = "id, email, name, is_admin";

#[derive(Debug, sqlx::FromRow)]
struct PublicUserRow {
    id: Uuid,
    email: String,
    name: String,
    is_admin: bool,
}

impl From<PublicUserRow> for PublicUser {
    fn from(r: PublicUserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            name: r.name,
            is_admin: r.is_admin,
        }
    }
}

pub async fn list_users(db: &PgPool, admins_only: bool) -> anyhow::Result<Vec<PublicUser>> {
    let rows = sqlx::query_as::<_, PublicUserRow>(&format!(
        "SELECT {PUBLIC_COLUMNS} FROM users WHERE NOT $1 OR is_admin ORDER BY name ASC"
    ))
    .bind(admins_only)
    .fetch_all(db)
    .await
    .context("list users")?;
    Ok(rows.into_iter().map(PublicUser::from).collect())
}

/// `None` when `id` does not reference a user.
pub async fn set_admin(db: &PgPool, id: Uuid, is_admin: bool) -> anyhow::Result<Option<PublicUser>> {
    let row = sqlx::query_as::<_, PublicUserRow>(&format!(
        "UPDATE users SET is_admin = $2 WHERE id = $1 RETURNING {PUBLIC_COLUMNS}"
    ))
    .bind(id)
    .bind(is_admin)
    .fetch_optional(db)
    .await
    .context("set admin flag")?;
    Ok(row.map(PublicUser::from))
}

#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::repo_types::User;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn admin_flag_round_trip(db: PgPool) {
        let ana = User::create(&db, "Ana", "ana@uni.br", "hash").await.unwrap().unwrap();
        let bia = User::create(&db, "Bia", "bia@uni.br", "hash").await.unwrap().unwrap();
        assert!(list_users(&db, true).await.unwrap().is_empty());

        let promoted = set_admin(&db, bia.id, true).await.unwrap().unwrap();
        assert!(promoted.is_admin);
        let admins = list_users(&db, true).await.unwrap();
        assert_eq!(admins.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bia.id]);
        let everyone = list_users(&db, false).await.unwrap();
        assert_eq!(everyone.iter().map(|u| u.id).collect::<Vec<_>>(), vec![ana.id, bia.id]);

        set_admin(&db, bia.id, false).await.unwrap().unwrap();
        assert!(list_users(&db, true).await.unwrap().is_empty());
        assert!(set_admin(&db, Uuid::new_v4(), true).await.unwrap().is_none());
    }
}

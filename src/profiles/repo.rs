use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::dto::{Profile, UpdateProfileRequest};

impl Profile {
    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, name, email, course, age, semester, interests, bio
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("load profile")?;
        Ok(profile)
    }

    /// Replaces the editable fields and clears `first_login`.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        req: &UpdateProfileRequest,
    ) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE users
               SET name = $2, bio = $3, course = $4, age = $5, semester = $6,
                   interests = $7, first_login = FALSE
             WHERE id = $1
            RETURNING id, name, email, course, age, semester, interests, bio
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(req.bio.as_deref())
        .bind(req.course.as_deref())
        .bind(req.age)
        .bind(req.semester)
        .bind(&req.interests)
        .fetch_optional(db)
        .await
        .context("update profile")?;
        Ok(profile)
    }
}

#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::repo_types::User;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn update_replaces_fields_and_clears_first_login(db: PgPool) {
        let ana = User::create(&db, "Ana", "ana@uni.br", "hash").await.unwrap().unwrap();
        let req = UpdateProfileRequest {
            name: "Ana Souza".into(),
            bio: None,
            course: Some("Computação".into()),
            age: Some(21),
            semester: Some(3),
            interests: vec!["rust".into()],
        };

        let profile = Profile::update(&db, ana.id, &req).await.unwrap().unwrap();
        assert_eq!(profile.name, "Ana Souza");
        assert_eq!(profile.interests, vec!["rust".to_string()]);
        let reloaded = User::find_by_id(&db, ana.id).await.unwrap().unwrap();
        assert!(!reloaded.first_login);
        assert!(Profile::update(&db, Uuid::new_v4(), &req).await.unwrap().is_none());
    }
}

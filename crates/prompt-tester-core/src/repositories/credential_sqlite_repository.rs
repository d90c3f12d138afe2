use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use crate::models::Credential;

use super::BoxFuture;
use super::credential_repository::{CredentialRepository, CredentialUpdate, NewCredential};
use super::database::{Database, from_millis, to_millis};
use super::error::RepositoryResult;

/// SQLite-backed credential store over the `api_keys` table
#[derive(Clone)]
pub struct CredentialSqliteRepository {
    pool: SqlitePool,
}

impl CredentialSqliteRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

fn row_to_credential(row: &SqliteRow) -> Credential {
    Credential {
        id: row.get("id"),
        name: row.get("name"),
        secret: row.get("key"),
        is_default: row.get::<i64, _>("is_default") != 0,
        created_at: from_millis(row.get("created_at")),
    }
}

async fn clear_default(pool: &SqlitePool) -> RepositoryResult<()> {
    sqlx::query("UPDATE api_keys SET is_default = 0")
        .execute(pool)
        .await?;
    Ok(())
}

async fn fetch_one(pool: &SqlitePool, id: i64) -> RepositoryResult<Option<Credential>> {
    let row = sqlx::query("SELECT id, name, key, is_default, created_at FROM api_keys WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_credential))
}

impl CredentialRepository for CredentialSqliteRepository {
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<Credential>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, name, key, is_default, created_at FROM api_keys ORDER BY id",
            )
            .fetch_all(&pool)
            .await?;
            Ok(rows.iter().map(row_to_credential).collect())
        })
    }

    fn get(&self, id: i64) -> BoxFuture<'static, RepositoryResult<Option<Credential>>> {
        let pool = self.pool.clone();
        Box::pin(async move { fetch_one(&pool, id).await })
    }

    fn get_default(&self) -> BoxFuture<'static, RepositoryResult<Option<Credential>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, name, key, is_default, created_at
                 FROM api_keys WHERE is_default = 1 ORDER BY id LIMIT 1",
            )
            .fetch_optional(&pool)
            .await?;
            Ok(row.as_ref().map(row_to_credential))
        })
    }

    fn create(&self, credential: NewCredential) -> BoxFuture<'static, RepositoryResult<Credential>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            if credential.is_default {
                clear_default(&pool).await?;
            }

            let created_at = Utc::now();
            let id = sqlx::query(
                "INSERT INTO api_keys (name, key, is_default, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&credential.name)
            .bind(&credential.secret)
            .bind(credential.is_default as i64)
            .bind(to_millis(created_at))
            .execute(&pool)
            .await?
            .last_insert_rowid();

            Ok(Credential {
                id,
                name: credential.name,
                secret: credential.secret,
                is_default: credential.is_default,
                created_at: from_millis(to_millis(created_at)),
            })
        })
    }

    fn update(
        &self,
        id: i64,
        update: CredentialUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<Credential>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let Some(existing) = fetch_one(&pool, id).await? else {
                return Ok(None);
            };

            if update.is_default == Some(true) {
                clear_default(&pool).await?;
            }

            sqlx::query("UPDATE api_keys SET name = ?1, key = ?2, is_default = ?3 WHERE id = ?4")
                .bind(update.name.unwrap_or(existing.name))
                .bind(update.secret.unwrap_or(existing.secret))
                .bind(update.is_default.unwrap_or(existing.is_default) as i64)
                .bind(id)
                .execute(&pool)
                .await?;

            fetch_one(&pool, id).await
        })
    }

    fn delete(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> CredentialSqliteRepository {
        let db = Database::in_memory().await.unwrap();
        CredentialSqliteRepository::new(&db)
    }

    fn new_credential(name: &str, is_default: bool) -> NewCredential {
        NewCredential {
            name: name.to_string(),
            secret: format!("secret-{}", name),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo().await;
        let created = repo.create(new_credential("work", false)).await.unwrap();

        let loaded = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(repo.get(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_at_most_one_default() {
        let repo = repo().await;
        let first = repo.create(new_credential("a", true)).await.unwrap();
        let second = repo.create(new_credential("b", true)).await.unwrap();

        let defaults: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);

        repo.update(
            first.id,
            CredentialUpdate {
                is_default: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let default = repo.get_default().await.unwrap().unwrap();
        assert_eq!(default.id, first.id);
        assert!(!repo.get(second.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_update_keeps_unspecified_fields() {
        let repo = repo().await;
        let created = repo.create(new_credential("old", false)).await.unwrap();

        let updated = repo
            .update(
                created.id,
                CredentialUpdate {
                    name: Some("new".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "new");
        assert_eq!(updated.secret, created.secret);
        assert!(repo.update(999, CredentialUpdate::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let created = repo.create(new_credential("gone", true)).await.unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_default().await.unwrap().is_none());
    }
}

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use crate::models::{CatalogModel, PromptKind, PromptSnippet};

use super::BoxFuture;
use super::catalog_repository::{
    CatalogRepository, ModelUpdate, NewPrompt, PromptFilter, PromptUpdate,
};
use super::database::{Database, from_millis, to_millis};
use super::error::{RepositoryError, RepositoryResult};

/// SQLite-backed catalog over `favorite_models` and `saved_prompts`
#[derive(Clone)]
pub struct CatalogSqliteRepository {
    pool: SqlitePool,
}

impl CatalogSqliteRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

fn row_to_model(row: &SqliteRow) -> CatalogModel {
    CatalogModel {
        id: row.get("id"),
        model_id: row.get("model_id"),
        display_name: row.get("display_name"),
        is_active: row.get::<i64, _>("is_active") != 0,
        sort_order: row.get("sort_order"),
    }
}

fn row_to_prompt(row: &SqliteRow) -> RepositoryResult<PromptSnippet> {
    let kind: String = row.get("kind");
    let kind = kind
        .parse::<PromptKind>()
        .map_err(|message| RepositoryError::InvalidData { message })?;
    Ok(PromptSnippet {
        id: row.get("id"),
        name: row.get("name"),
        kind,
        content: row.get("content"),
        category: row.get("category"),
        created_at: from_millis(row.get("created_at")),
        updated_at: from_millis(row.get("updated_at")),
    })
}

async fn fetch_model(pool: &SqlitePool, id: i64) -> RepositoryResult<Option<CatalogModel>> {
    let row = sqlx::query(
        "SELECT id, model_id, display_name, is_active, sort_order FROM favorite_models WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_model))
}

async fn fetch_prompt(pool: &SqlitePool, id: i64) -> RepositoryResult<Option<PromptSnippet>> {
    let row = sqlx::query(
        "SELECT id, name, kind, content, category, created_at, updated_at
         FROM saved_prompts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_prompt).transpose()
}

impl CatalogRepository for CatalogSqliteRepository {
    fn list_models(
        &self,
        include_inactive: bool,
    ) -> BoxFuture<'static, RepositoryResult<Vec<CatalogModel>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, model_id, display_name, is_active, sort_order
                 FROM favorite_models
                 WHERE is_active = 1 OR ?1
                 ORDER BY sort_order, id",
            )
            .bind(include_inactive)
            .fetch_all(&pool)
            .await?;
            Ok(rows.iter().map(row_to_model).collect())
        })
    }

    fn add_model(
        &self,
        model_id: &str,
        display_name: &str,
    ) -> BoxFuture<'static, RepositoryResult<CatalogModel>> {
        let pool = self.pool.clone();
        let model_id = model_id.to_string();
        let display_name = display_name.to_string();
        Box::pin(async move {
            let max: Option<i64> = sqlx::query_scalar("SELECT MAX(sort_order) FROM favorite_models")
                .fetch_one(&pool)
                .await?;
            let sort_order = max.unwrap_or(0) + 1;

            let id = sqlx::query(
                "INSERT INTO favorite_models (model_id, display_name, is_active, sort_order)
                 VALUES (?1, ?2, 1, ?3)",
            )
            .bind(&model_id)
            .bind(&display_name)
            .bind(sort_order)
            .execute(&pool)
            .await?
            .last_insert_rowid();

            Ok(CatalogModel {
                id,
                model_id,
                display_name,
                is_active: true,
                sort_order,
            })
        })
    }

    fn update_model(
        &self,
        id: i64,
        update: ModelUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<CatalogModel>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let Some(existing) = fetch_model(&pool, id).await? else {
                return Ok(None);
            };

            sqlx::query(
                "UPDATE favorite_models SET display_name = ?1, is_active = ?2, sort_order = ?3
                 WHERE id = ?4",
            )
            .bind(update.display_name.unwrap_or(existing.display_name))
            .bind(update.is_active.unwrap_or(existing.is_active) as i64)
            .bind(update.sort_order.unwrap_or(existing.sort_order))
            .bind(id)
            .execute(&pool)
            .await?;

            fetch_model(&pool, id).await
        })
    }

    fn delete_model(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM favorite_models WHERE id = ?")
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn reorder_models(&self, orders: Vec<(i64, i64)>) -> BoxFuture<'static, RepositoryResult<()>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut tx = pool.begin().await?;
            for (id, sort_order) in orders {
                let result = sqlx::query("UPDATE favorite_models SET sort_order = ?1 WHERE id = ?2")
                    .bind(sort_order)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    // Dropping the transaction rolls back earlier updates.
                    return Err(RepositoryError::NotFound {
                        entity: "model",
                        id,
                    });
                }
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn list_prompts(
        &self,
        filter: PromptFilter,
    ) -> BoxFuture<'static, RepositoryResult<Vec<PromptSnippet>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, name, kind, content, category, created_at, updated_at
                 FROM saved_prompts
                 WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR category = ?2)
                 ORDER BY updated_at DESC, id DESC",
            )
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.category.as_deref())
            .fetch_all(&pool)
            .await?;
            rows.iter().map(row_to_prompt).collect()
        })
    }

    fn create_prompt(&self, prompt: NewPrompt) -> BoxFuture<'static, RepositoryResult<PromptSnippet>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let now = from_millis(to_millis(Utc::now()));
            let id = sqlx::query(
                "INSERT INTO saved_prompts (name, kind, content, category, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )
            .bind(&prompt.name)
            .bind(prompt.kind.as_str())
            .bind(&prompt.content)
            .bind(prompt.category.as_deref())
            .bind(to_millis(now))
            .execute(&pool)
            .await?
            .last_insert_rowid();

            Ok(PromptSnippet {
                id,
                name: prompt.name,
                kind: prompt.kind,
                content: prompt.content,
                category: prompt.category,
                created_at: now,
                updated_at: now,
            })
        })
    }

    fn update_prompt(
        &self,
        id: i64,
        update: PromptUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<PromptSnippet>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let Some(existing) = fetch_prompt(&pool, id).await? else {
                return Ok(None);
            };

            sqlx::query(
                "UPDATE saved_prompts
                 SET name = ?1, kind = ?2, content = ?3, category = ?4, updated_at = ?5
                 WHERE id = ?6",
            )
            .bind(update.name.unwrap_or(existing.name))
            .bind(update.kind.unwrap_or(existing.kind).as_str())
            .bind(update.content.unwrap_or(existing.content))
            .bind(update.category.unwrap_or(existing.category))
            .bind(to_millis(Utc::now()))
            .bind(id)
            .execute(&pool)
            .await?;

            fetch_prompt(&pool, id).await
        })
    }

    fn delete_prompt(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM saved_prompts WHERE id = ?")
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

    async fn repo() -> CatalogSqliteRepository {
        let db = Database::in_memory().await.unwrap();
        CatalogSqliteRepository::new(&db)
    }

    #[tokio::test]
    async fn test_seeded_catalog_order() {
        let repo = repo().await;
        let models = repo.list_models(false).await.unwrap();

        assert_eq!(models.len(), 6);
        assert_eq!(models[0].model_id, "anthropic/claude-sonnet-4");
        assert_eq!(models[5].display_name, "Llama 3.3 70B");
        let orders: Vec<i64> = models.iter().map(|m| m.sort_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_add_model_appends_after_max() {
        let repo = repo().await;
        let added = repo.add_model("x/new", "New").await.unwrap();
        assert_eq!(added.sort_order, 7);

        let models = repo.list_models(false).await.unwrap();
        assert_eq!(models.last().unwrap().id, added.id);
    }

    #[tokio::test]
    async fn test_inactive_models_hidden_by_default() {
        let repo = repo().await;
        let first = repo.list_models(false).await.unwrap()[0].clone();
        repo.update_model(
            first.id,
            ModelUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(repo.list_models(false).await.unwrap().len(), 5);
        assert_eq!(repo.list_models(true).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_ties_broken_by_insertion_order() {
        let repo = repo().await;
        let a = repo.add_model("x/a", "A").await.unwrap();
        let b = repo.add_model("x/b", "B").await.unwrap();
        repo.reorder_models(vec![(b.id, 0), (a.id, 0)]).await.unwrap();

        let models = repo.list_models(false).await.unwrap();
        assert_eq!(models[0].id, a.id);
        assert_eq!(models[1].id, b.id);
    }

    #[tokio::test]
    async fn test_reorder_is_all_or_nothing() {
        let repo = repo().await;
        let before = repo.list_models(false).await.unwrap();

        let result = repo
            .reorder_models(vec![(before[0].id, 100), (9999, 1)])
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::NotFound { id: 9999, .. })
        ));

        let after = repo.list_models(false).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_prompt_filters() {
        let repo = repo().await;
        repo.create_prompt(NewPrompt {
            name: "terse".into(),
            kind: PromptKind::System,
            content: "Be terse.".into(),
            category: Some("style".into()),
        })
        .await
        .unwrap();
        repo.create_prompt(NewPrompt {
            name: "greet".into(),
            kind: PromptKind::User,
            content: "Say hi".into(),
            category: None,
        })
        .await
        .unwrap();

        let system = repo
            .list_prompts(PromptFilter {
                kind: Some(PromptKind::System),
                category: None,
            })
            .await
            .unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].name, "terse");

        let style = repo
            .list_prompts(PromptFilter {
                kind: None,
                category: Some("style".into()),
            })
            .await
            .unwrap();
        assert_eq!(style.len(), 1);

        assert_eq!(repo.list_prompts(PromptFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_prompt_moves_it_first() {
        let repo = repo().await;
        let first = repo
            .create_prompt(NewPrompt {
                name: "one".into(),
                kind: PromptKind::User,
                content: "1".into(),
                category: Some("c".into()),
            })
            .await
            .unwrap();
        repo.create_prompt(NewPrompt {
            name: "two".into(),
            kind: PromptKind::User,
            content: "2".into(),
            category: None,
        })
        .await
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let updated = repo
            .update_prompt(
                first.id,
                PromptUpdate {
                    content: Some("one!".into()),
                    category: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "one!");
        assert_eq!(updated.category, None);

        let listed = repo.list_prompts(PromptFilter::default()).await.unwrap();
        assert_eq!(listed[0].id, first.id);

        assert!(repo.delete_prompt(first.id).await.unwrap());
        assert!(repo.update_prompt(first.id, PromptUpdate::default()).await.unwrap().is_none());
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::models::{
    CatalogModel, Credential, PersistedMessage, PersistedThread, PromptSnippet, Session,
    SessionDetail, SessionSummary, ThreadDetail, sort_catalog,
};

use super::BoxFuture;
use super::catalog_repository::{
    CatalogRepository, DEFAULT_MODELS, ModelUpdate, NewPrompt, PromptFilter, PromptUpdate,
};
use super::credential_repository::{CredentialRepository, CredentialUpdate, NewCredential};
use super::error::{RepositoryError, RepositoryResult};
use super::session_repository::{NewMessage, NewSession, SessionRepository};

/// Rows keyed by id with a monotonically increasing id counter
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// In-memory credential store
/// Useful for testing and development
#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    credentials: Arc<Mutex<Table<Credential>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<Credential>>> {
        let credentials = self.credentials.clone();
        Box::pin(async move { Ok(credentials.lock().rows.values().cloned().collect()) })
    }

    fn get(&self, id: i64) -> BoxFuture<'static, RepositoryResult<Option<Credential>>> {
        let credentials = self.credentials.clone();
        Box::pin(async move { Ok(credentials.lock().rows.get(&id).cloned()) })
    }

    fn get_default(&self) -> BoxFuture<'static, RepositoryResult<Option<Credential>>> {
        let credentials = self.credentials.clone();
        Box::pin(async move {
            Ok(credentials
                .lock()
                .rows
                .values()
                .find(|c| c.is_default)
                .cloned())
        })
    }

    fn create(&self, credential: NewCredential) -> BoxFuture<'static, RepositoryResult<Credential>> {
        let credentials = self.credentials.clone();
        Box::pin(async move {
            let mut table = credentials.lock();
            if credential.is_default {
                table.rows.values_mut().for_each(|c| c.is_default = false);
            }
            let id = table.allocate_id();
            let created = Credential {
                id,
                name: credential.name,
                secret: credential.secret,
                is_default: credential.is_default,
                created_at: Utc::now(),
            };
            table.rows.insert(id, created.clone());
            Ok(created)
        })
    }

    fn update(
        &self,
        id: i64,
        update: CredentialUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<Credential>>> {
        let credentials = self.credentials.clone();
        Box::pin(async move {
            let mut table = credentials.lock();
            if !table.rows.contains_key(&id) {
                return Ok(None);
            }
            if update.is_default == Some(true) {
                table.rows.values_mut().for_each(|c| c.is_default = false);
            }
            let Some(credential) = table.rows.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(name) = update.name {
                credential.name = name;
            }
            if let Some(secret) = update.secret {
                credential.secret = secret;
            }
            if let Some(is_default) = update.is_default {
                credential.is_default = is_default;
            }
            Ok(Some(credential.clone()))
        })
    }

    fn delete(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let credentials = self.credentials.clone();
        Box::pin(async move { Ok(credentials.lock().rows.remove(&id).is_some()) })
    }
}

struct CatalogTables {
    models: Table<CatalogModel>,
    prompts: Table<PromptSnippet>,
}

/// In-memory model catalog and prompt store, seeded like a fresh database
#[derive(Clone)]
pub struct InMemoryCatalogRepository {
    tables: Arc<Mutex<CatalogTables>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        let mut models = Table::default();
        for (index, (model_id, display_name)) in DEFAULT_MODELS.iter().enumerate() {
            let id = models.allocate_id();
            models.rows.insert(
                id,
                CatalogModel {
                    id,
                    model_id: model_id.to_string(),
                    display_name: display_name.to_string(),
                    is_active: true,
                    sort_order: index as i64 + 1,
                },
            );
        }
        Self {
            tables: Arc::new(Mutex::new(CatalogTables {
                models,
                prompts: Table::default(),
            })),
        }
    }
}

impl Default for InMemoryCatalogRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogRepository for InMemoryCatalogRepository {
    fn list_models(
        &self,
        include_inactive: bool,
    ) -> BoxFuture<'static, RepositoryResult<Vec<CatalogModel>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut models: Vec<CatalogModel> = tables
                .lock()
                .models
                .rows
                .values()
                .filter(|m| include_inactive || m.is_active)
                .cloned()
                .collect();
            sort_catalog(&mut models);
            Ok(models)
        })
    }

    fn add_model(
        &self,
        model_id: &str,
        display_name: &str,
    ) -> BoxFuture<'static, RepositoryResult<CatalogModel>> {
        let tables = self.tables.clone();
        let model_id = model_id.to_string();
        let display_name = display_name.to_string();
        Box::pin(async move {
            let mut tables = tables.lock();
            let sort_order = tables
                .models
                .rows
                .values()
                .map(|m| m.sort_order)
                .max()
                .unwrap_or(0)
                + 1;
            let id = tables.models.allocate_id();
            let model = CatalogModel {
                id,
                model_id,
                display_name,
                is_active: true,
                sort_order,
            };
            tables.models.rows.insert(id, model.clone());
            Ok(model)
        })
    }

    fn update_model(
        &self,
        id: i64,
        update: ModelUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<CatalogModel>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            let Some(model) = tables.models.rows.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(display_name) = update.display_name {
                model.display_name = display_name;
            }
            if let Some(is_active) = update.is_active {
                model.is_active = is_active;
            }
            if let Some(sort_order) = update.sort_order {
                model.sort_order = sort_order;
            }
            Ok(Some(model.clone()))
        })
    }

    fn delete_model(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.lock().models.rows.remove(&id).is_some()) })
    }

    fn reorder_models(&self, orders: Vec<(i64, i64)>) -> BoxFuture<'static, RepositoryResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            if let Some((id, _)) = orders
                .iter()
                .find(|(id, _)| !tables.models.rows.contains_key(id))
            {
                return Err(RepositoryError::NotFound {
                    entity: "model",
                    id: *id,
                });
            }
            for (id, sort_order) in orders {
                if let Some(model) = tables.models.rows.get_mut(&id) {
                    model.sort_order = sort_order;
                }
            }
            Ok(())
        })
    }

    fn list_prompts(
        &self,
        filter: PromptFilter,
    ) -> BoxFuture<'static, RepositoryResult<Vec<PromptSnippet>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut prompts: Vec<PromptSnippet> = tables
                .lock()
                .prompts
                .rows
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect();
            prompts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
            Ok(prompts)
        })
    }

    fn create_prompt(&self, prompt: NewPrompt) -> BoxFuture<'static, RepositoryResult<PromptSnippet>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            let id = tables.prompts.allocate_id();
            let now = Utc::now();
            let snippet = PromptSnippet {
                id,
                name: prompt.name,
                kind: prompt.kind,
                content: prompt.content,
                category: prompt.category,
                created_at: now,
                updated_at: now,
            };
            tables.prompts.rows.insert(id, snippet.clone());
            Ok(snippet)
        })
    }

    fn update_prompt(
        &self,
        id: i64,
        update: PromptUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<PromptSnippet>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            let Some(prompt) = tables.prompts.rows.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(name) = update.name {
                prompt.name = name;
            }
            if let Some(kind) = update.kind {
                prompt.kind = kind;
            }
            if let Some(content) = update.content {
                prompt.content = content;
            }
            if let Some(category) = update.category {
                prompt.category = category;
            }
            prompt.updated_at = Utc::now();
            Ok(Some(prompt.clone()))
        })
    }

    fn delete_prompt(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.lock().prompts.rows.remove(&id).is_some()) })
    }
}

#[derive(Default)]
struct SessionTables {
    sessions: Table<Session>,
    threads: Table<PersistedThread>,
    messages: Table<PersistedMessage>,
}

/// In-memory session store with the same cascade rules as SQLite
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    tables: Arc<Mutex<SessionTables>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, RepositoryResult<Session>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            let id = tables.sessions.allocate_id();
            let created = Session {
                id,
                name: session.name,
                credential_id: session.credential_id,
                system_prompt: session.system_prompt,
                mode: session.mode,
                created_at: Utc::now(),
            };
            tables.sessions.rows.insert(id, created.clone());
            Ok(created)
        })
    }

    fn list_sessions(&self) -> BoxFuture<'static, RepositoryResult<Vec<SessionSummary>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let tables = tables.lock();
            let mut summaries: Vec<SessionSummary> = tables
                .sessions
                .rows
                .values()
                .map(|session| SessionSummary {
                    session: session.clone(),
                    thread_count: tables
                        .threads
                        .rows
                        .values()
                        .filter(|t| t.session_id == session.id)
                        .count(),
                })
                .collect();
            summaries.sort_by(|a, b| {
                b.session
                    .created_at
                    .cmp(&a.session.created_at)
                    .then(b.session.id.cmp(&a.session.id))
            });
            Ok(summaries)
        })
    }

    fn get_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<Option<SessionDetail>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let tables = tables.lock();
            let Some(session) = tables.sessions.rows.get(&id).cloned() else {
                return Ok(None);
            };
            let threads = tables
                .threads
                .rows
                .values()
                .filter(|t| t.session_id == id)
                .map(|thread| ThreadDetail {
                    thread: thread.clone(),
                    messages: tables
                        .messages
                        .rows
                        .values()
                        .filter(|m| m.thread_id == thread.id)
                        .cloned()
                        .collect(),
                })
                .collect();
            Ok(Some(SessionDetail { session, threads }))
        })
    }

    fn rename_session(
        &self,
        id: i64,
        name: Option<String>,
    ) -> BoxFuture<'static, RepositoryResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            let Some(session) = tables.sessions.rows.get_mut(&id) else {
                return Ok(false);
            };
            session.name = name;
            Ok(true)
        })
    }

    fn delete_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            if tables.sessions.rows.remove(&id).is_none() {
                return Ok(false);
            }
            let thread_ids: Vec<i64> = tables
                .threads
                .rows
                .values()
                .filter(|t| t.session_id == id)
                .map(|t| t.id)
                .collect();
            tables.threads.rows.retain(|_, t| t.session_id != id);
            tables
                .messages
                .rows
                .retain(|_, m| !thread_ids.contains(&m.thread_id));
            Ok(true)
        })
    }

    fn create_thread(
        &self,
        session_id: i64,
        model_id: &str,
        iteration: Option<u32>,
    ) -> BoxFuture<'static, RepositoryResult<PersistedThread>> {
        let tables = self.tables.clone();
        let model_id = model_id.to_string();
        Box::pin(async move {
            let mut tables = tables.lock();
            if !tables.sessions.rows.contains_key(&session_id) {
                return Err(RepositoryError::NotFound {
                    entity: "session",
                    id: session_id,
                });
            }
            let id = tables.threads.allocate_id();
            let thread = PersistedThread {
                id,
                session_id,
                model_id,
                iteration,
                created_at: Utc::now(),
            };
            tables.threads.rows.insert(id, thread.clone());
            Ok(thread)
        })
    }

    fn append_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, RepositoryResult<PersistedMessage>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut tables = tables.lock();
            if !tables.threads.rows.contains_key(&message.thread_id) {
                return Err(RepositoryError::NotFound {
                    entity: "thread",
                    id: message.thread_id,
                });
            }
            let id = tables.messages.allocate_id();
            let persisted = PersistedMessage {
                id,
                thread_id: message.thread_id,
                role: message.role,
                content: message.content,
                attachments: message.attachments,
                input_tokens: message.input_tokens,
                output_tokens: message.output_tokens,
                cost: message.cost,
                latency_ms: message.latency_ms,
                created_at: message.created_at,
            };
            tables.messages.rows.insert(id, persisted.clone());
            Ok(persisted)
        })
    }
}

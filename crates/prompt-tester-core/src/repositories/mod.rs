use std::future::Future;
use std::pin::Pin;

pub mod catalog_repository;
pub mod catalog_sqlite_repository;
pub mod credential_repository;
pub mod credential_sqlite_repository;
pub mod database;
pub mod error;
pub mod in_memory_repository;
pub mod session_repository;
pub mod session_sqlite_repository;

pub use catalog_repository::{
    CatalogRepository, DEFAULT_MODELS, ModelUpdate, NewPrompt, PromptFilter, PromptUpdate,
};
pub use catalog_sqlite_repository::CatalogSqliteRepository;
pub use credential_repository::{CredentialRepository, CredentialUpdate, NewCredential};
pub use credential_sqlite_repository::CredentialSqliteRepository;
pub use database::Database;
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_repository::{
    InMemoryCatalogRepository, InMemoryCredentialRepository, InMemorySessionRepository,
};
pub use session_repository::{NewMessage, NewSession, SessionRepository};
pub use session_sqlite_repository::SessionSqliteRepository;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

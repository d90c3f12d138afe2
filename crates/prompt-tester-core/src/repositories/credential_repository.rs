use crate::models::Credential;

use super::BoxFuture;
use super::error::RepositoryResult;

/// Fields for a new credential. `secret` is stored as given, so callers
/// encrypt it first.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub name: String,
    pub secret: String,
    pub is_default: bool,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub name: Option<String>,
    pub secret: Option<String>,
    pub is_default: Option<bool>,
}

/// Repository trait for API credential persistence.
///
/// Setting `is_default` clears the flag on every other credential first.
/// The clear and the set are separate writes.
pub trait CredentialRepository: Send + Sync + 'static {
    /// All credentials, oldest first
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<Credential>>>;

    fn get(&self, id: i64) -> BoxFuture<'static, RepositoryResult<Option<Credential>>>;

    fn get_default(&self) -> BoxFuture<'static, RepositoryResult<Option<Credential>>>;

    fn create(&self, credential: NewCredential) -> BoxFuture<'static, RepositoryResult<Credential>>;

    /// Returns `None` when no credential has this id
    fn update(
        &self,
        id: i64,
        update: CredentialUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<Credential>>>;

    /// Returns whether a row was removed
    fn delete(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>>;
}

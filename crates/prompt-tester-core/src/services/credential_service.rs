use std::sync::Arc;

use tracing::info;

use crate::models::{Credential, CredentialRef, MaskedCredential, mask_secret};
use crate::repositories::{CredentialRepository, CredentialUpdate, NewCredential, RepositoryResult};

use super::encryption::CredentialCipher;

/// Credential operations with encryption at the repository boundary.
///
/// Secrets are encrypted before they reach the repository and decrypted only
/// by `reveal` and the masking helpers.
#[derive(Clone)]
pub struct CredentialService {
    repository: Arc<dyn CredentialRepository>,
    cipher: CredentialCipher,
}

impl CredentialService {
    pub fn new(repository: Arc<dyn CredentialRepository>, cipher: CredentialCipher) -> Self {
        Self { repository, cipher }
    }

    fn mask(&self, credential: Credential) -> MaskedCredential {
        let plaintext = self.cipher.decrypt_or_passthrough(&credential.secret);
        MaskedCredential {
            id: credential.id,
            name: credential.name,
            masked_secret: mask_secret(&plaintext),
            is_default: credential.is_default,
            created_at: credential.created_at,
        }
    }

    pub async fn list(&self) -> RepositoryResult<Vec<MaskedCredential>> {
        let credentials = self.repository.list().await?;
        Ok(credentials.into_iter().map(|c| self.mask(c)).collect())
    }

    pub async fn create(
        &self,
        name: &str,
        secret: &str,
        is_default: bool,
    ) -> RepositoryResult<MaskedCredential> {
        let created = self
            .repository
            .create(NewCredential {
                name: name.to_string(),
                secret: self.cipher.encrypt(secret),
                is_default,
            })
            .await?;
        info!(id = created.id, is_default, "Created credential");
        Ok(self.mask(created))
    }

    /// Returns `None` when the id is unknown
    pub async fn update(
        &self,
        id: i64,
        name: Option<String>,
        secret: Option<&str>,
        is_default: Option<bool>,
    ) -> RepositoryResult<Option<MaskedCredential>> {
        let updated = self
            .repository
            .update(
                id,
                CredentialUpdate {
                    name,
                    secret: secret.map(|s| self.cipher.encrypt(s)),
                    is_default,
                },
            )
            .await?;
        Ok(updated.map(|c| self.mask(c)))
    }

    pub async fn set_default(&self, id: i64) -> RepositoryResult<Option<MaskedCredential>> {
        self.update(id, None, None, Some(true)).await
    }

    pub async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        self.repository.delete(id).await
    }

    /// Look up a credential by reference without decrypting it
    pub async fn get(&self, reference: CredentialRef) -> RepositoryResult<Option<Credential>> {
        match reference {
            CredentialRef::Id(id) => self.repository.get(id).await,
            CredentialRef::Default => self.repository.get_default().await,
        }
    }

    /// Plaintext secret for outbound requests
    pub fn reveal(&self, credential: &Credential) -> String {
        self.cipher.decrypt_or_passthrough(&credential.secret)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored API credential.
///
/// `secret` holds the value as persisted (normally ciphertext). Use
/// `CredentialService::resolve` to obtain the plaintext for a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub name: String,
    pub secret: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Credential projection safe for listing: the secret is masked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskedCredential {
    pub id: i64,
    pub name: String,
    pub masked_secret: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// How a submission names the credential to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialRef {
    Id(i64),
    Default,
}

impl From<Option<i64>> for CredentialRef {
    fn from(id: Option<i64>) -> Self {
        id.map(CredentialRef::Id).unwrap_or(CredentialRef::Default)
    }
}

/// Mask a plaintext secret for display: first 8 and last 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    if chars.len() <= 12 {
        return format!("****{}", tail);
    }
    let head: String = chars[..8].iter().collect();
    format!("{}...{}", head, tail)
}

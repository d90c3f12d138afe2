use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

const SALT_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;
const MIN_KEY_LENGTH: usize = 32;
const DEFAULT_PHRASE: &str = "prompt-tester-default-key-change-me";

/// Environment variable holding the master key
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext must have four ':'-separated parts")]
    Format,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("authentication failed")]
    Authentication,

    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM cipher for credentials at rest.
///
/// Output format is `salt:nonce:tag:ciphertext`, each part standard base64.
/// Every record gets a fresh salt and nonce; the record key is
/// `SHA-256(master || salt)`.
#[derive(Clone)]
pub struct CredentialCipher {
    master: [u8; 32],
}

impl CredentialCipher {
    /// Use `secret` when it is at least 32 bytes, otherwise the built-in phrase.
    pub fn new(secret: Option<&str>) -> Self {
        let master = match secret {
            Some(secret) if secret.len() >= MIN_KEY_LENGTH => Sha256::digest(secret.as_bytes()),
            Some(_) => {
                warn!(
                    "{} is shorter than {} characters; using the built-in key",
                    ENCRYPTION_KEY_ENV, MIN_KEY_LENGTH
                );
                Sha256::digest(DEFAULT_PHRASE.as_bytes())
            }
            None => Sha256::digest(DEFAULT_PHRASE.as_bytes()),
        };
        Self {
            master: master.into(),
        }
    }

    /// Master key from `ENCRYPTION_KEY`
    pub fn from_env() -> Self {
        Self::new(std::env::var(ENCRYPTION_KEY_ENV).ok().as_deref())
    }

    fn record_key(&self, salt: &[u8]) -> Aes256Gcm {
        let mut hasher = Sha256::new();
        hasher.update(self.master);
        hasher.update(salt);
        let key = hasher.finalize();
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut salt = [0u8; SALT_LENGTH];
        let mut nonce = [0u8; NONCE_LENGTH];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let sealed = match self
            .record_key(&salt)
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        {
            Ok(sealed) => sealed,
            // Only reachable for plaintexts beyond the GCM length limit.
            Err(_) => return plaintext.to_string(),
        };
        let (data, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);

        [&salt[..], &nonce[..], tag, data]
            .iter()
            .map(|part| STANDARD.encode(part))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let parts: Vec<&str> = stored.split(':').collect();
        let [salt, nonce, tag, data] = parts.as_slice() else {
            return Err(CryptoError::Format);
        };

        let salt = STANDARD.decode(salt)?;
        let nonce = STANDARD.decode(nonce)?;
        let tag = STANDARD.decode(tag)?;
        let mut sealed = STANDARD.decode(data)?;
        if nonce.len() != NONCE_LENGTH || tag.len() != TAG_LENGTH {
            return Err(CryptoError::Authentication);
        }
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .record_key(&salt)
            .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| CryptoError::Authentication)?;
        Ok(String::from_utf8(plaintext)?)
    }

    /// Decrypt, or return the stored value verbatim when it does not decrypt.
    /// Rows written before encryption was introduced hold plaintext.
    pub fn decrypt_or_passthrough(&self, stored: &str) -> String {
        match self.decrypt(stored) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(error = %e, "Credential did not decrypt; using stored value as-is");
                stored.to_string()
            }
        }
    }
}

/// Whether a stored value has the shape of `encrypt` output
pub fn is_encrypted(stored: &str) -> bool {
    let parts: Vec<&str> = stored.split(':').collect();
    parts.len() == 4
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.trim_end_matches('=').chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
        })
}

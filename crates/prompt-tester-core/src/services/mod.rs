pub mod credential_service;
pub mod encryption;
pub mod llm_service;
pub mod pricing;
pub mod provider_error;
pub mod sse;

pub use credential_service::CredentialService;
pub use encryption::{CredentialCipher, CryptoError, is_encrypted};
pub use llm_service::{ChatProvider, ChatRequest, OpenRouterClient};
pub use pricing::{ModelPricing, PricingCache};
pub use provider_error::ProviderError;
pub use sse::{ByteStream, Completion, SseDecoder, StreamEvent, decode_stream};

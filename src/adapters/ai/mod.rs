//! AI Adapters.
//!
//! Implementations of the AIProvider, ReplyGenerator and PatternEnricher ports.
//!
//! ## Available Adapters
//!
//! - `MockAIProvider` - Configurable mock for testing and the offline demo
//! - `OpenAIProvider` - OpenAI-compatible chat completions (OpenAI, Ollama)
//! - `ProviderReplyGenerator` - JSON replies on top of any provider
//! - `GenerativePatternEnricher` - Model-assisted pattern detection

mod generative_enricher;
mod mock_provider;
mod openai_provider;
mod provider_reply_generator;

pub use generative_enricher::{GenerativePatternEnricher, DEFAULT_MIN_HISTORY};
pub use mock_provider::{MockAIProvider, MockError, MockResponse};
pub use openai_provider::{OpenAIConfig, OpenAIProvider, OLLAMA_BASE_URL};
pub use provider_reply_generator::{ProviderReplyGenerator, DEFAULT_PARSE_RETRIES};

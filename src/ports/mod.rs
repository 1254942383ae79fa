//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the coaching core and the outside world. Adapters implement these ports.
//!
//! - `AIProvider` - chat-completion model backend
//! - `ReplyGenerator` - structured JSON generation on top of a provider
//! - `PatternEnricher` - optional model-assisted pattern detection
//! - `StateStorage` - conversation state persistence between turns

mod ai_provider;
mod pattern_enricher;
mod reply_generator;
mod state_storage;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, ProviderInfo,
    RequestMetadata, TokenUsage,
};
pub use pattern_enricher::PatternEnricher;
pub use reply_generator::{
    ExpectedShape, GenerationError, GenerationMetadata, GenerationOutput, GenerationRequest,
    ReplyGenerator,
};
pub use state_storage::{StateStorage, StateStorageError};

//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the coaching core to external systems:
//! - `ai` - Model providers, structured reply generation, pattern enrichment
//! - `storage` - Conversation state persistence (file, in-memory)

pub mod ai;
pub mod storage;

pub use ai::{
    GenerativePatternEnricher, MockAIProvider, OpenAIConfig, OpenAIProvider,
    ProviderReplyGenerator,
};
pub use storage::{FileStateStorage, InMemoryStateStorage};

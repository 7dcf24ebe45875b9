//! LLM provider seam.
//!
//! [`Provider`] is the only thing the agent loop knows about the model; the
//! OpenAI-compatible implementation is the production backend.

pub mod openai;
pub mod traits;

pub use openai::OpenAiProvider;
pub use traits::{
    flatten_text, ChatMessage, ChatRequest, ChatResponse, Provider, ProviderError, Role, ToolCall,
};

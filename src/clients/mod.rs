pub mod llm_client;

pub use llm_client::{ChatRequest, LlmBackend, LlmCallError, LlmClient, LlmResponse};

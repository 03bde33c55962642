//! Generation crate for the pollkit answering service.
//!
//! This crate provides a provider-agnostic abstraction for answer
//! generation. It supports a locally hosted model runtime with an
//! OpenAI-compatible cloud fallback, selected per request through a
//! unified trait-based interface.
//!
//! # Providers
//! - **Ollama**: local model runtime (preferred)
//! - **OpenAI-compatible**: authenticated cloud API (fallback only)
//!
//! # Example
//! ```no_run
//! use pollkit_llm::{ChatMessage, GenerationGateway};
//! use pollkit_core::GenerationConfig;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GenerationGateway::from_config(&GenerationConfig::default(), None);
//! let (_backend, mut stream) = gateway
//!     .generate(&[ChatMessage::user("What time do polls open?")])
//!     .await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod gateway;
pub mod providers;

// Re-export main types
pub use client::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatStream, ChatStreamChunk, LlmClient,
};
pub use gateway::{GenerationBackend, GenerationGateway};
pub use providers::{OllamaClient, OpenAiClient};

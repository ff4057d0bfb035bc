//! The networked core of the assistant: an HTTP service that classifies
//! text queries with the `echo` intent engine, dispatches skills, renders
//! template replies and falls back to an LLM completion when recognition
//! confidence is too low.

pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod mappings;
pub mod skills;

pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use http::{router, AppState};
pub use llm::LlmClient;
pub use skills::HandlerRegistry;

// src/llm/mod.rs
// Text-generation plumbing: interchangeable providers, the registry
// assembled at startup, and the gateway every AI-assisted feature calls.

pub mod gateway;
pub mod parse;
pub mod provider;
pub mod registry;

pub use gateway::ProviderGateway;
pub use provider::{ProviderError, TextProvider};
pub use registry::ProviderRegistry;

//! # parley-llm
//!
//! Abstraction over the completion service. The engine talks to a
//! [`CompletionClient`]; [`GeminiClient`] speaks the Gemini `generateContent`
//! wire format and [`MockClient`] replays scripted results in tests.

pub mod gemini;
pub mod mock;
pub mod provider;

pub use gemini::GeminiClient;
pub use mock::{MockClient, MockResponse};
pub use provider::{CompletionClient, CompletionRequest, CompletionResult};

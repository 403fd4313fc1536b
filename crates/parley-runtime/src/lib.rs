//! # parley-runtime
//!
//! The orchestration engine and the pieces around it.
//!
//! ## Architecture
//!
//! ```text
//!    Telegram / Local              HTTP (parley-server)
//!          │ ChannelEvent                 │
//!          ▼                              │
//!    ┌────────────┐                       │
//!    │  Bot loop  │                       │
//!    └─────┬──────┘                       │
//!          │ InboundMessage               │
//!          ▼                              ▼
//!    ┌──────────────────────────────────────────┐
//!    │                  Engine                  │
//!    │  ModelPending ──► ToolPending ──┐        │
//!    │       ▲                         │        │
//!    │       └─────────────────────────┘        │
//!    │  Completed │ Failed                      │
//!    └─────┬───────────────┬────────────────────┘
//!          ▼               ▼
//!    CompletionClient   ToolRegistry       TranscriptStore
//! ```
//!
//! A turn works on a private copy of the session transcript. Only a
//! completed turn is written back, in one append.

pub mod bot;
pub mod engine;
pub mod transcript;

pub use bot::{handle_incoming, run_channel};
pub use engine::{Command, Engine, EngineConfig, InboundMessage, Reply};
pub use transcript::TranscriptStore;

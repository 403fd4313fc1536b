//! # parley-core
//!
//! Core types, traits, and errors for the Parley orchestrator.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! transcript turns, tool declarations and the tool handler trait.

pub mod error;
pub mod tool;
pub mod turn;
pub mod types;

pub use error::{ParleyError, Result};
pub use tool::{ParamType, ToolContext, ToolDeclaration, ToolHandler, ToolInvocation, ToolParameter};
pub use turn::{Part, Role, Turn};
pub use types::*;

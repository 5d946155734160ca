//! Shared types for the chat-completion router: errors, route targets, and the request model.

pub mod error;
pub mod request;
pub mod types;

pub use error::{Result, RouterError};
pub use request::{ChatRequest, Message, SystemBlock, SystemPrompt, ToolDecl};
pub use types::{OutputFormat, RouteKind, RouterTarget};

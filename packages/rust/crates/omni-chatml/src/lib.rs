#![allow(clippy::doc_markdown)]

//! omni-chatml - ChatML prompt codec for local function-calling models
//!
//! Compiles a role-tagged conversation plus function schemas into one ChatML
//! prompt for a non-chat-native model, and parses the model's raw
//! continuation back into inner thoughts and a function call.
//!
//! # Architecture (ODF-REP Compliant)
//!
//! ```text
//! omni-chatml/src/
//! ├── lib.rs          # Re-exports (this file)
//! ├── error.rs        # WrapperError / ProtocolError (thiserror)
//! ├── config.rs       # WrapperConfig
//! ├── message.rs      # Message, Role, FunctionCall, ToolCall
//! ├── schema.rs       # FunctionSchema
//! ├── json_repair.rs  # Tolerant JSON recovery
//! ├── compiler.rs     # Conversation -> prompt
//! ├── parser.rs       # Raw output -> ParsedReply
//! └── wrapper.rs      # PromptWrapper trait + variants
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use omni_chatml::{Message, PromptWrapper, WrapperVariant};
//!
//! let wrapper = WrapperVariant::InnerMonologue.build(Default::default());
//! let prompt = wrapper.compile(&[Message::system("You are Sam.")], &functions, true, None)?;
//! let raw = backend.complete(&prompt)?;
//! let reply = wrapper.parse(&raw, true)?;
//! ```

// ============================================================================
// Module Declarations (ODF-REP: Atomic Structure)
// ============================================================================

mod compiler;
mod config;
mod error;
mod json_repair;
mod message;
mod parser;
mod schema;
mod wrapper;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use compiler::{IM_END, IM_START};
pub use config::{
    DEFAULT_ASSISTANT_PREFIX, DEFAULT_FIRST_MESSAGE_PREFIX, OUTER_MONOLOGUE_ASSISTANT_PREFIX,
    WrapperConfig,
};
pub use error::{ErrorKind, ProtocolError, UnknownVariantError, WrapperError, WrapperResult};
pub use json_repair::repair_json;
pub use message::{FunctionCall, Message, Role, ToolCall};
pub use parser::ParsedReply;
pub use schema::{FunctionParameters, FunctionSchema};
pub use wrapper::{InnerMonologueWrapper, OuterMonologueWrapper, PromptWrapper, WrapperVariant};

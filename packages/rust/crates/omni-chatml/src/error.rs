//! Error types for prompt compilation and response parsing.
//!
//! Follows ODF-REP: Library crates use `thiserror` for explicit error enums.

use serde_json::Value;
use thiserror::Error;

/// Result alias used across the crate.
pub type WrapperResult<T> = Result<T, WrapperError>;

/// Structural problems in a conversation handed to the compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No messages were supplied.
    #[error("conversation is empty; the first message must have role `system`")]
    EmptyConversation,

    /// The first message is not a system message.
    #[error("first message must have role `system`, got `{0}`")]
    MissingSystemMessage(String),

    /// A message role outside `system`/`user`/`assistant`/`tool`.
    #[error("unknown message role `{0}`")]
    UnknownRole(String),

    /// An assistant function call carries arguments that are not a JSON object.
    #[error("arguments of function call `{name}` are not a JSON object: {reason}")]
    InvalidArguments {
        /// Function name of the offending call.
        name: String,
        /// Decoder message.
        reason: String,
    },
}

/// Wrapper name that matches no known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown wrapper variant `{0}` (expected `chatml` or `chatml-noforce`)")]
pub struct UnknownVariantError(pub String);

/// Coarse classification of a [`WrapperError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input conversation violated a structural invariant.
    Protocol,
    /// Raw model output could not be coerced into a JSON object.
    Parsing,
    /// Parsed output lacked a field required by the active variant.
    Schema,
}

/// Errors surfaced by [`crate::PromptWrapper::compile`] and [`crate::PromptWrapper::parse`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WrapperError {
    /// Invalid conversation passed to the compiler.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Model output is not recoverable as a JSON object.
    #[error("Failed to decode JSON from LLM output: {reason}\n{raw}")]
    Parsing {
        /// Output text after forced-prefix re-prepending.
        raw: String,
        /// Last decoder message.
        reason: String,
    },

    /// Model output is JSON but misses a required field.
    #[error(
        "Received valid JSON from LLM, but field `{field}` was missing or invalid. JSON result was:\n{parsed}"
    )]
    Schema {
        /// Name of the missing or mistyped field.
        field: String,
        /// The parsed object, for diagnostics.
        parsed: Value,
    },
}

impl WrapperError {
    /// Which of the three failure classes this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Parsing { .. } => ErrorKind::Parsing,
            Self::Schema { .. } => ErrorKind::Schema,
        }
    }

    pub(crate) fn schema(field: &str, parsed: &serde_json::Map<String, Value>) -> Self {
        Self::Schema {
            field: field.to_string(),
            parsed: Value::Object(parsed.clone()),
        }
    }
}

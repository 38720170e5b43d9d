//! Chat message types (OpenAI-compatible).

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Speaker of one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and memory.
    System,
    /// Human (or upstream agent) input.
    User,
    /// Model output.
    Assistant,
    /// Function return value. Accepts the legacy `function` name.
    #[serde(alias = "function")]
    Tool,
    /// Any role outside the closed set; rejected by the compiler.
    #[serde(untagged)]
    Unknown(String),
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::Unknown(role) => role,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function call payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool/function name.
    pub name: String,
    /// JSON string of arguments; always an encoded object.
    pub arguments: String,
}

impl FunctionCall {
    /// Build a call from a name and an argument object.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: &Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments: Value::Object(arguments.clone()).to_string(),
        }
    }

    /// Decode `arguments` into a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArguments`] when the text is not a
    /// JSON object.
    pub fn decoded_arguments(&self) -> Result<Map<String, Value>, ProtocolError> {
        let invalid = |reason: String| ProtocolError::InvalidArguments {
            name: self.name.clone(),
            reason,
        };
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(invalid(format!("expected object, got `{other}`"))),
            Err(error) => Err(invalid(error.to_string())),
        }
    }
}

/// Tool call from assistant message (OpenAI format).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique id for this tool call.
    pub id: String,
    /// Type (e.g. "function").
    #[serde(rename = "type")]
    pub typ: String,
    /// Function name and arguments.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Wrap a function call as a `function`-typed tool call.
    #[must_use]
    pub fn function(id: impl Into<String>, function: FunctionCall) -> Self {
        Self {
            id: id.into(),
            typ: "function".to_string(),
            function,
        }
    }
}

/// One message in OpenAI-compatible chat format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker of the turn.
    pub role: Role,
    /// Text content; inner thoughts for assistant turns with a call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Agent alias or tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Legacy single function call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Assistant tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    /// Message with the given role and content.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            function_call: None,
            tool_calls: None,
        }
    }

    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Tool result message.
    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Set the agent alias / tool name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a legacy function call.
    #[must_use]
    pub fn with_function_call(mut self, call: FunctionCall) -> Self {
        self.function_call = Some(call);
        self
    }

    /// Attach tool calls.
    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    /// Content as `&str`, empty when absent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

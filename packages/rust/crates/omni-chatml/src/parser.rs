//! Raw model continuation → [`ParsedReply`].

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::WrapperConfig;
use crate::error::{WrapperError, WrapperResult};
use crate::json_repair::repair_json;
use crate::message::{FunctionCall, Message, Role};
use crate::wrapper::PromptWrapper;

/// Assistant reply recovered from raw model output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedReply {
    /// Private reasoning emitted next to (or instead of) the call.
    pub inner_thoughts: Option<String>,
    /// Function the model chose to invoke, if any.
    pub function_call: Option<FunctionCall>,
}

impl ParsedReply {
    /// Assistant message carrying the thoughts as content plus the call.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            role: Role::Assistant,
            content: self.inner_thoughts,
            name: None,
            function_call: self.function_call,
            tool_calls: None,
        }
    }
}

pub(crate) fn parse<W: PromptWrapper + ?Sized>(
    wrapper: &W,
    raw_output: &str,
    first_message: bool,
) -> WrapperResult<ParsedReply> {
    let mut text = Cow::Borrowed(raw_output);
    // A continuation that opens its own object restarted the reply instead of
    // continuing the prefix; prepending would nest it.
    if let Some(prefix) = wrapper.forced_prefix(first_message)
        && !raw_output.starts_with(prefix)
        && !raw_output.trim_start().starts_with('{')
    {
        tracing::debug!(
            variant = %wrapper.variant(),
            first_message,
            "re-prepending forced assistant prefix to LLM output"
        );
        text = Cow::Owned(format!("{prefix}{raw_output}"));
    }

    let output = repair_json(&text)?;
    wrapper.extract_reply(output)
}

/// Function-forcing grammar: `{"function": ..., "params": {"inner_thoughts": ..., ...}}`.
pub(crate) fn extract_inner_monologue(
    config: &WrapperConfig,
    mut output: Map<String, Value>,
) -> WrapperResult<ParsedReply> {
    // Models that ignore the forced prefix sometimes nest the whole call
    // under `function`.
    while matches!(output.get("function"), Some(Value::Object(_))) {
        let Some(Value::Object(nested)) = output.shift_remove("function") else {
            break;
        };
        tracing::debug!("unwrapping nested `function` object in LLM output");
        output = nested;
    }

    let name = required_string(&output, "function")?;
    let params = required_object(&output, "params")?;
    let (inner_thoughts, arguments) = clean_arguments(config, &name, params);
    Ok(ParsedReply {
        inner_thoughts,
        function_call: Some(FunctionCall::new(name, &arguments)),
    })
}

/// Optional-call grammar: `{"inner_thoughts": ..., "function": ..., "params": {...}}`.
pub(crate) fn extract_outer_monologue(
    config: &WrapperConfig,
    output: &Map<String, Value>,
) -> WrapperResult<ParsedReply> {
    let inner_thoughts = output
        .get("inner_thoughts")
        .ok_or_else(|| WrapperError::schema("inner_thoughts", output))?
        .clone();
    let inner_thoughts = thoughts_text(inner_thoughts);

    let name = match output.get("function") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) if name.trim().eq_ignore_ascii_case("none") => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => return Err(WrapperError::schema("function", output)),
    };
    let Some(name) = name else {
        return Ok(ParsedReply {
            inner_thoughts,
            function_call: None,
        });
    };

    let params = required_object(output, "params")?;
    let (_, arguments) = clean_arguments(config, &name, params);
    Ok(ParsedReply {
        inner_thoughts,
        function_call: Some(FunctionCall::new(name, &arguments)),
    })
}

fn required_string(output: &Map<String, Value>, field: &str) -> WrapperResult<String> {
    match output.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(WrapperError::schema(field, output)),
    }
}

fn required_object(
    output: &Map<String, Value>,
    field: &str,
) -> WrapperResult<Map<String, Value>> {
    match output.get(field) {
        Some(Value::Object(value)) => Ok(value.clone()),
        _ => Err(WrapperError::schema(field, output)),
    }
}

/// Split `inner_thoughts` out of the arguments and drop no-op flags.
///
/// `inner_thoughts` is always removed so it never appears both as the reply
/// content and as an argument.
fn clean_arguments(
    config: &WrapperConfig,
    function_name: &str,
    mut arguments: Map<String, Value>,
) -> (Option<String>, Map<String, Value>) {
    if config.clean_function_args
        && function_name == "send_message"
        && arguments.shift_remove("request_heartbeat").is_some()
    {
        tracing::debug!(function_name, "dropped request_heartbeat argument");
    }
    let inner_thoughts = arguments
        .shift_remove("inner_thoughts")
        .and_then(thoughts_text);
    (inner_thoughts, arguments)
}

fn thoughts_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

//! Conversation → ChatML prompt.
//!
//! Every turn is rendered as `<|im_start|>{role}\n{body}<|im_end|>`; BOS/EOS
//! tokens are left to the inference backend.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::config::WrapperConfig;
use crate::error::{ProtocolError, WrapperResult};
use crate::message::{FunctionCall, Message, Role};
use crate::schema::FunctionSchema;
use crate::wrapper::PromptWrapper;

/// Token opening a ChatML turn.
pub const IM_START: &str = "<|im_start|>";

/// Token closing a ChatML turn.
pub const IM_END: &str = "<|im_end|>";

const INNER_THOUGHTS_KEY: &str = "inner_thoughts";

pub(crate) fn compile<W: PromptWrapper + ?Sized>(
    wrapper: &W,
    messages: &[Message],
    functions: &[FunctionSchema],
    first_message: bool,
    function_documentation: Option<&str>,
) -> WrapperResult<String> {
    let config = wrapper.config();
    let (system, rest) = messages
        .split_first()
        .ok_or(ProtocolError::EmptyConversation)?;
    if let Role::Unknown(role) = &system.role {
        return Err(ProtocolError::UnknownRole(role.clone()).into());
    }
    if system.role != Role::System {
        return Err(ProtocolError::MissingSystemMessage(system.role.to_string()).into());
    }

    let mut turns = Vec::with_capacity(messages.len());
    let system_block = render_system(wrapper, system.text(), functions, function_documentation);
    turns.push(turn("system", system_block.trim()));

    for message in rest {
        let rendered = match &message.role {
            Role::User => {
                let (role, body) = render_user(config, message);
                turn(&role, body.trim())
            }
            Role::Assistant => {
                let body = render_assistant(wrapper, message)?;
                turn(&aliased_role(config, message), body.trim())
            }
            Role::System => {
                let block =
                    render_system(wrapper, message.text(), functions, function_documentation);
                turn("system", block.trim())
            }
            Role::Tool => {
                let body = render_tool_return(message.text());
                if config.allow_function_role {
                    turn(Role::Tool.as_str(), body.trim())
                } else {
                    let folded = format!("{}{}", config.no_function_role_prefix, body.trim());
                    turn(&config.no_function_role_role, &folded)
                }
            }
            Role::Unknown(role) => return Err(ProtocolError::UnknownRole(role.clone()).into()),
        };
        turns.push(rendered);
    }

    let mut prompt = turns.join("\n");
    if config.include_assistant_prefix {
        prompt.push('\n');
        prompt.push_str(IM_START);
        prompt.push_str(Role::Assistant.as_str());
        if config.assistant_prefix_hint {
            prompt.push('\n');
            prompt.push_str(config.hint(first_message));
        }
        if let Some(prefix) = wrapper.forced_prefix(first_message) {
            prompt.push_str(prefix);
        }
    }

    tracing::trace!(
        variant = %wrapper.variant(),
        messages = messages.len(),
        functions = functions.len(),
        first_message,
        prompt_chars = prompt.len(),
        "compiled chatml prompt"
    );
    Ok(prompt)
}

/// Function-choice instruction followed by one description per schema.
pub(crate) fn describe_functions(
    config: &WrapperConfig,
    functions: &[FunctionSchema],
    instruction: &str,
    include_inner_thoughts: bool,
) -> String {
    let mut block = instruction.to_string();
    block.push_str("\nAvailable functions:");
    for schema in functions {
        block.push('\n');
        block.push_str(&describe_function(config, schema, include_inner_thoughts));
    }
    block
}

fn describe_function(
    config: &WrapperConfig,
    schema: &FunctionSchema,
    include_inner_thoughts: bool,
) -> String {
    let mut text = format!(
        "{}:\n  description: {}\n  params:",
        schema.name, schema.description
    );
    if include_inner_thoughts {
        text.push_str(&format!(
            "\n    {INNER_THOUGHTS_KEY}: {}",
            config.inner_thoughts_description
        ));
    }
    // Types and `required` are not rendered; local models follow descriptions.
    for (name, description) in schema.param_descriptions() {
        text.push_str(&format!("\n    {name}: {description}"));
    }
    text
}

/// `{"function": name, "params": {"inner_thoughts": ..., ...arguments}}`
pub(crate) fn render_inner_monologue_call(
    config: &WrapperConfig,
    call: &FunctionCall,
    inner_thoughts: Option<&str>,
) -> WrapperResult<String> {
    let arguments = call.decoded_arguments()?;
    let mut params = Map::new();
    params.insert(INNER_THOUGHTS_KEY.to_string(), thoughts_value(inner_thoughts));
    params.extend(arguments);

    let mut object = Map::new();
    object.insert("function".to_string(), Value::String(call.name.clone()));
    object.insert("params".to_string(), Value::Object(params));
    Ok(to_indented_json(&Value::Object(object), config.json_indent))
}

/// `{"inner_thoughts": ..., "function": name, "params": {...arguments}}`
pub(crate) fn render_outer_monologue_call(
    config: &WrapperConfig,
    call: &FunctionCall,
    inner_thoughts: Option<&str>,
) -> WrapperResult<String> {
    let arguments = call.decoded_arguments()?;
    let mut object = Map::new();
    object.insert(INNER_THOUGHTS_KEY.to_string(), thoughts_value(inner_thoughts));
    object.insert("function".to_string(), Value::String(call.name.clone()));
    object.insert("params".to_string(), Value::Object(arguments));
    Ok(to_indented_json(&Value::Object(object), config.json_indent))
}

fn thoughts_value(inner_thoughts: Option<&str>) -> Value {
    inner_thoughts.map_or(Value::Null, |text| Value::String(text.to_string()))
}

fn turn(role: &str, body: &str) -> String {
    format!("{IM_START}{role}\n{body}{IM_END}")
}

fn render_system<W: PromptWrapper + ?Sized>(
    wrapper: &W,
    content: &str,
    functions: &[FunctionSchema],
    function_documentation: Option<&str>,
) -> String {
    let mut block = format!("{content}\n");
    match function_documentation {
        Some(documentation) => {
            block.push_str(&wrapper.config().function_choice_instruction);
            block.push_str("\nAvailable functions:\n");
            block.push_str(documentation);
        }
        None => block.push_str(&wrapper.describe_functions(functions)),
    }
    block
}

/// Custom agent name (lower-cased) when aliasing is on, else the role itself.
fn aliased_role(config: &WrapperConfig, message: &Message) -> String {
    match message.name.as_deref() {
        Some(name) if config.allow_custom_roles => name.trim().to_lowercase(),
        _ => message.role.as_str().to_string(),
    }
}

fn render_user(config: &WrapperConfig, message: &Message) -> (String, String) {
    let content = message.text();
    let parsed = serde_json::from_str::<Value>(content).ok();

    let body = match &parsed {
        Some(value) if config.simplify_json_content => value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(content)
            .to_string(),
        Some(value) => to_indented_json(value, config.json_indent),
        None => content.to_string(),
    };

    let mut role = aliased_role(config, message);
    if config.use_system_role_in_user
        && let Some(kind) = parsed.as_ref().and_then(|value| value.get("type"))
        && kind.as_str() != Some("user_message")
    {
        role = Role::System.as_str().to_string();
    }
    (role, body)
}

fn render_assistant<W: PromptWrapper + ?Sized>(
    wrapper: &W,
    message: &Message,
) -> WrapperResult<String> {
    let inner_thoughts = message.content.as_deref();
    if let Some(call) = &message.function_call {
        return Ok(format!(
            "\n{}",
            wrapper.render_function_call(call, inner_thoughts)?
        ));
    }
    if let Some(calls) = message.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
        let mut body = String::new();
        for call in calls {
            body.push('\n');
            body.push_str(&wrapper.render_function_call(&call.function, inner_thoughts)?);
        }
        return Ok(body);
    }
    Ok(message.text().to_string())
}

/// Tool returns are re-serialized without indentation to keep them compact.
fn render_tool_return(content: &str) -> String {
    serde_json::from_str::<Value>(content)
        .map_or_else(|_| content.to_string(), |value| to_indented_json(&value, 0))
}

/// Pretty JSON with `indent` spaces per level; `0` keeps the newlines.
pub(crate) fn to_indented_json(value: &Value, indent: usize) -> String {
    let indent = " ".repeat(indent);
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(
        &mut buffer,
        PrettyFormatter::with_indent(indent.as_bytes()),
    );
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(buffer).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn indented_json_respects_width() {
        let value = json!({"a": {"b": 1}});
        assert_eq!(
            to_indented_json(&value, 2),
            "{\n  \"a\": {\n    \"b\": 1\n  }\n}"
        );
        assert_eq!(to_indented_json(&value, 0), "{\n\"a\": {\n\"b\": 1\n}\n}");
    }

    #[test]
    fn function_description_lists_params_in_declaration_order() {
        let schema = FunctionSchema::new("lookup", "Find a record.")
            .with_param("id", "integer", "Record id.", true)
            .with_param("verbose", "boolean", "Include details.", false);
        let text = describe_function(&WrapperConfig::default(), &schema, true);
        assert_eq!(
            text,
            "lookup:\n  description: Find a record.\n  params:\n    inner_thoughts: Deep inner monologue private to you only.\n    id: Record id.\n    verbose: Include details."
        );
    }
}

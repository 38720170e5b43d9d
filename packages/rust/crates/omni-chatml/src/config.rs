use serde::{Deserialize, Serialize};

/// Regular-turn prefix that forces the model to open with the function name.
pub const DEFAULT_ASSISTANT_PREFIX: &str = "\n{\n  \"function\":";

/// First-turn prefix that forces a `send_message` call.
pub const DEFAULT_FIRST_MESSAGE_PREFIX: &str = "\n{\n  \"function\": \"send_message\",";

/// Regular-turn prefix for the outer-monologue grammar.
pub const OUTER_MONOLOGUE_ASSISTANT_PREFIX: &str = "\n{\n  \"inner_thoughts\":";

const FUNCTION_CHOICE_INSTRUCTION: &str = "Please select the most suitable function and parameters from the list of available functions below, based on the ongoing conversation. Provide your response in JSON format.";

const OPTIONAL_CALL_INSTRUCTION: &str =
    "You must always include inner thoughts, but you do not always have to call a function.";

const INNER_THOUGHTS_DESCRIPTION: &str = "Deep inner monologue private to you only.";

const PREFIX_HINT: &str = "# Reminders:
# Important information about yourself and the user is stored in (limited) core memory
# You can modify core memory with core_memory_replace
# You can add to core memory with core_memory_append
# Less important information is stored in (unlimited) archival memory
# You can add to archival memory with archival_memory_insert
# You can search archival memory with archival_memory_search
# You will always see the statistics of archival memory, so you know if there is content inside it
# If you receive new important information about the user (or yourself), you immediately update your memory with core_memory_replace, core_memory_append, or archival_memory_insert";

const FIRST_PREFIX_HINT: &str = "# Reminders:
# This is your first interaction with the user!
# Initial information about them is provided in the core memory user block
# Make sure to introduce yourself to them
# Your inner thoughts should be private, interesting, and creative
# Do NOT use inner thoughts to communicate with the user
# Use send_message to communicate with the user";

/// Rendering and parsing knobs shared by both wrapper variants.
///
/// The value is never mutated after construction; one instance can back any
/// number of concurrent `compile`/`parse` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    /// Indentation width for JSON rendered into the prompt.
    pub json_indent: usize,
    /// Render user JSON payloads as their plain `message` text.
    pub simplify_json_content: bool,
    /// Drop `request_heartbeat` from parsed `send_message` arguments.
    pub clean_function_args: bool,
    /// Open an assistant turn at the end of the prompt.
    pub include_assistant_prefix: bool,
    /// Forced text after the opening assistant turn.
    pub assistant_prefix_extra: Option<String>,
    /// Forced text for the first turn, when the variant supports it.
    pub assistant_prefix_extra_first_message: Option<String>,
    /// Render user/assistant turns under the message `name` when present.
    pub allow_custom_roles: bool,
    /// Render user JSON whose `type` is not `user_message` under `system`.
    pub use_system_role_in_user: bool,
    /// Render tool results under their own `tool` role.
    pub allow_function_role: bool,
    /// Role used for tool results when `allow_function_role` is off.
    pub no_function_role_role: String,
    /// Literal prepended to folded tool results.
    pub no_function_role_prefix: String,
    /// Insert a reminder hint before the forced prefix.
    pub assistant_prefix_hint: bool,
    /// Reminder used on regular turns.
    pub prefix_hint: String,
    /// Reminder used on the first turn.
    pub first_prefix_hint: String,
    /// Sentence introducing the function list in the system block.
    pub function_choice_instruction: String,
    /// Sentence appended to the instruction when a call is optional.
    pub optional_call_instruction: String,
    /// Description of the injected `inner_thoughts` parameter.
    pub inner_thoughts_description: String,
}

impl WrapperConfig {
    /// Defaults for the outer-monologue grammar.
    #[must_use]
    pub fn outer_monologue() -> Self {
        Self {
            assistant_prefix_extra: Some(OUTER_MONOLOGUE_ASSISTANT_PREFIX.to_string()),
            ..Self::default()
        }
    }

    /// Hint text for the given turn.
    pub(crate) fn hint(&self, first_message: bool) -> &str {
        if first_message {
            &self.first_prefix_hint
        } else {
            &self.prefix_hint
        }
    }
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            json_indent: 2,
            simplify_json_content: false,
            clean_function_args: true,
            include_assistant_prefix: true,
            assistant_prefix_extra: Some(DEFAULT_ASSISTANT_PREFIX.to_string()),
            assistant_prefix_extra_first_message: Some(DEFAULT_FIRST_MESSAGE_PREFIX.to_string()),
            allow_custom_roles: true,
            use_system_role_in_user: false,
            allow_function_role: false,
            no_function_role_role: "assistant".to_string(),
            no_function_role_prefix: "FUNCTION RETURN:\n".to_string(),
            assistant_prefix_hint: false,
            prefix_hint: PREFIX_HINT.to_string(),
            first_prefix_hint: FIRST_PREFIX_HINT.to_string(),
            function_choice_instruction: FUNCTION_CHOICE_INSTRUCTION.to_string(),
            optional_call_instruction: OPTIONAL_CALL_INSTRUCTION.to_string(),
            inner_thoughts_description: INNER_THOUGHTS_DESCRIPTION.to_string(),
        }
    }
}

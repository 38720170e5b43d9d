//! Wrapper variants: where inner thoughts live relative to the function call.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::WrapperConfig;
use crate::error::{UnknownVariantError, WrapperResult};
use crate::message::{FunctionCall, Message};
use crate::parser::ParsedReply;
use crate::schema::FunctionSchema;
use crate::{compiler, parser};

/// Prompt codec for one ChatML grammar.
///
/// Implementors supply the variant-specific steps (function block, rendered
/// call, field extraction); system/user/tool rendering, prefix forcing and
/// JSON repair are shared through the provided methods.
pub trait PromptWrapper: Send + Sync {
    /// Configuration backing this wrapper.
    fn config(&self) -> &WrapperConfig;

    /// Grammar implemented by this wrapper.
    fn variant(&self) -> WrapperVariant;

    /// Whether the first turn may be forced with its own prefix.
    fn supports_first_message(&self) -> bool;

    /// Function-choice instruction plus one description per schema.
    fn describe_functions(&self, functions: &[FunctionSchema]) -> String;

    /// Serialize a past call (with its thoughts) for an assistant turn.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the call arguments are not a JSON object.
    fn render_function_call(
        &self,
        call: &FunctionCall,
        inner_thoughts: Option<&str>,
    ) -> WrapperResult<String>;

    /// Pull thoughts and call out of the repaired output object.
    ///
    /// # Errors
    ///
    /// Returns a schema error when a field required by the grammar is missing.
    fn extract_reply(&self, output: Map<String, Value>) -> WrapperResult<ParsedReply>;

    /// Forced text that opens the assistant turn, if any.
    fn forced_prefix(&self, first_message: bool) -> Option<&str> {
        let config = self.config();
        let prefix = if self.supports_first_message() && first_message {
            config.assistant_prefix_extra_first_message.as_deref()
        } else {
            config.assistant_prefix_extra.as_deref()
        };
        prefix.filter(|prefix| !prefix.is_empty())
    }

    /// Render a conversation into one ChatML prompt.
    ///
    /// `function_documentation`, when given, replaces the generated function
    /// descriptions verbatim.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the conversation does not start with a
    /// system message, contains an unknown role, or carries undecodable call
    /// arguments.
    fn compile(
        &self,
        messages: &[Message],
        functions: &[FunctionSchema],
        first_message: bool,
        function_documentation: Option<&str>,
    ) -> WrapperResult<String> {
        compiler::compile(
            self,
            messages,
            functions,
            first_message,
            function_documentation,
        )
    }

    /// Recover the assistant reply from a raw continuation.
    ///
    /// # Errors
    ///
    /// Returns a parsing error when no JSON object can be recovered, or a
    /// schema error when required fields are missing.
    fn parse(&self, raw_output: &str, first_message: bool) -> WrapperResult<ParsedReply> {
        parser::parse(self, raw_output, first_message)
    }
}

/// Selectable ChatML grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WrapperVariant {
    /// Thoughts inside `params`; every reply must call a function.
    #[default]
    #[serde(rename = "chatml")]
    InnerMonologue,
    /// Thoughts beside the call; the call may be omitted.
    #[serde(rename = "chatml-noforce")]
    OuterMonologue,
}

impl WrapperVariant {
    /// All variants.
    pub const ALL: [Self; 2] = [Self::InnerMonologue, Self::OuterMonologue];

    /// Stable wrapper name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::InnerMonologue => "chatml",
            Self::OuterMonologue => "chatml-noforce",
        }
    }

    /// Default configuration for this grammar.
    #[must_use]
    pub fn default_config(self) -> WrapperConfig {
        match self {
            Self::InnerMonologue => WrapperConfig::default(),
            Self::OuterMonologue => WrapperConfig::outer_monologue(),
        }
    }

    /// Box the wrapper for this grammar around `config`.
    #[must_use]
    pub fn build(self, config: WrapperConfig) -> Box<dyn PromptWrapper> {
        match self {
            Self::InnerMonologue => Box::new(InnerMonologueWrapper::new(config)),
            Self::OuterMonologue => Box::new(OuterMonologueWrapper::new(config)),
        }
    }
}

impl Display for WrapperVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WrapperVariant {
    type Err = UnknownVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownVariantError(value.to_string()))
    }
}

/// ChatML wrapper that keeps inner thoughts inside the function call.
#[derive(Debug, Clone, Default)]
pub struct InnerMonologueWrapper {
    config: WrapperConfig,
}

impl InnerMonologueWrapper {
    /// Wrap `config`.
    #[must_use]
    pub fn new(config: WrapperConfig) -> Self {
        Self { config }
    }
}

impl PromptWrapper for InnerMonologueWrapper {
    fn config(&self) -> &WrapperConfig {
        &self.config
    }

    fn variant(&self) -> WrapperVariant {
        WrapperVariant::InnerMonologue
    }

    fn supports_first_message(&self) -> bool {
        true
    }

    fn describe_functions(&self, functions: &[FunctionSchema]) -> String {
        compiler::describe_functions(
            &self.config,
            functions,
            &self.config.function_choice_instruction,
            true,
        )
    }

    fn render_function_call(
        &self,
        call: &FunctionCall,
        inner_thoughts: Option<&str>,
    ) -> WrapperResult<String> {
        compiler::render_inner_monologue_call(&self.config, call, inner_thoughts)
    }

    fn extract_reply(&self, output: Map<String, Value>) -> WrapperResult<ParsedReply> {
        parser::extract_inner_monologue(&self.config, output)
    }
}

/// ChatML wrapper that moves inner thoughts outside the call, letting the
/// model reply with thoughts only.
///
/// Models forget to call functions more often under this grammar.
#[derive(Debug, Clone)]
pub struct OuterMonologueWrapper {
    config: WrapperConfig,
}

impl OuterMonologueWrapper {
    /// Wrap `config`.
    #[must_use]
    pub fn new(config: WrapperConfig) -> Self {
        Self { config }
    }
}

impl Default for OuterMonologueWrapper {
    fn default() -> Self {
        Self::new(WrapperConfig::outer_monologue())
    }
}

impl PromptWrapper for OuterMonologueWrapper {
    fn config(&self) -> &WrapperConfig {
        &self.config
    }

    fn variant(&self) -> WrapperVariant {
        WrapperVariant::OuterMonologue
    }

    // TODO: force the first call once a prefix exists that still allows
    // thoughts-only replies.
    fn supports_first_message(&self) -> bool {
        false
    }

    fn describe_functions(&self, functions: &[FunctionSchema]) -> String {
        let instruction = format!(
            "{} {}",
            self.config.function_choice_instruction, self.config.optional_call_instruction
        );
        compiler::describe_functions(&self.config, functions, &instruction, false)
    }

    fn render_function_call(
        &self,
        call: &FunctionCall,
        inner_thoughts: Option<&str>,
    ) -> WrapperResult<String> {
        compiler::render_outer_monologue_call(&self.config, call, inner_thoughts)
    }

    fn extract_reply(&self, output: Map<String, Value>) -> WrapperResult<ParsedReply> {
        parser::extract_outer_monologue(&self.config, &output)
    }
}

#![doc = "Integration tests for wrapper variants and configuration."]

use omni_chatml::{
    DEFAULT_ASSISTANT_PREFIX, FunctionCall, InnerMonologueWrapper, Message,
    OUTER_MONOLOGUE_ASSISTANT_PREFIX, OuterMonologueWrapper, ParsedReply, PromptWrapper, Role,
    UnknownVariantError, WrapperConfig, WrapperVariant,
};
use serde_json::{Map, Value, json};

fn lookup_call() -> FunctionCall {
    let Value::Object(arguments) = json!({"id": 42}) else {
        unreachable!("literal is an object");
    };
    FunctionCall::new("lookup", &arguments)
}

fn compact(rendered: &str) -> String {
    serde_json::from_str::<Value>(rendered)
        .unwrap_or_else(|error| panic!("rendered call is not JSON: {error}"))
        .to_string()
}

fn render(wrapper: &dyn PromptWrapper) -> String {
    wrapper
        .render_function_call(&lookup_call(), Some("checking state"))
        .unwrap_or_else(|error| panic!("render failed: {error}"))
}

#[test]
fn variants_place_inner_thoughts_differently() {
    let inner = render(&InnerMonologueWrapper::default());
    let outer = render(&OuterMonologueWrapper::default());

    assert_eq!(
        compact(&inner),
        r#"{"function":"lookup","params":{"inner_thoughts":"checking state","id":42}}"#
    );
    assert_eq!(
        compact(&outer),
        r#"{"inner_thoughts":"checking state","function":"lookup","params":{"id":42}}"#
    );
}

#[test]
fn compiled_assistant_turn_matches_rendered_call() {
    let wrapper = InnerMonologueWrapper::default();
    let messages = [
        Message::system("sys"),
        Message::assistant("checking state").with_function_call(lookup_call()),
    ];

    let prompt = wrapper
        .compile(&messages, &[], false, None)
        .unwrap_or_else(|error| panic!("compile failed: {error}"));

    let expected_turn = format!("<|im_start|>assistant\n{}<|im_end|>", render(&wrapper));
    assert!(prompt.contains(&expected_turn));
}

#[test]
fn rendered_calls_parse_back_to_the_same_reply() {
    let wrappers: [(Box<dyn PromptWrapper>, &str); 2] = [
        (
            Box::new(InnerMonologueWrapper::default()),
            DEFAULT_ASSISTANT_PREFIX,
        ),
        (
            Box::new(OuterMonologueWrapper::default()),
            OUTER_MONOLOGUE_ASSISTANT_PREFIX,
        ),
    ];

    for (wrapper, prefix) in wrappers {
        let rendered = format!("\n{}", render(wrapper.as_ref()));
        let continuation = rendered
            .strip_prefix(prefix)
            .unwrap_or_else(|| panic!("{} render does not start with its prefix", wrapper.variant()));

        let reply = wrapper
            .parse(continuation, false)
            .unwrap_or_else(|error| panic!("{} parse failed: {error}", wrapper.variant()));

        assert_eq!(
            reply,
            ParsedReply {
                inner_thoughts: Some("checking state".to_string()),
                function_call: Some(lookup_call()),
            },
            "variant {}",
            wrapper.variant()
        );
    }
}

#[test]
fn variant_names_round_trip() {
    for variant in WrapperVariant::ALL {
        let parsed: WrapperVariant = variant
            .to_string()
            .parse()
            .unwrap_or_else(|error| panic!("failed to parse {variant}: {error}"));
        assert_eq!(parsed, variant);
    }

    assert_eq!(
        " ChatML ".parse::<WrapperVariant>(),
        Ok(WrapperVariant::InnerMonologue)
    );
    assert_eq!(
        "airoboros".parse::<WrapperVariant>(),
        Err(UnknownVariantError("airoboros".to_string()))
    );
}

#[test]
fn variant_serializes_as_wrapper_name() {
    let encoded = serde_json::to_string(&WrapperVariant::OuterMonologue)
        .unwrap_or_else(|error| panic!("serialize failed: {error}"));
    assert_eq!(encoded, "\"chatml-noforce\"");

    let decoded: WrapperVariant = serde_json::from_str("\"chatml\"")
        .unwrap_or_else(|error| panic!("deserialize failed: {error}"));
    assert_eq!(decoded, WrapperVariant::InnerMonologue);
    assert_eq!(WrapperVariant::default(), WrapperVariant::InnerMonologue);
}

#[test]
fn build_uses_matching_wrapper() {
    for variant in WrapperVariant::ALL {
        let wrapper = variant.build(variant.default_config());
        assert_eq!(wrapper.variant(), variant);
    }

    let outer = WrapperVariant::OuterMonologue.build(WrapperVariant::OuterMonologue.default_config());
    assert_eq!(
        outer.forced_prefix(true),
        Some(OUTER_MONOLOGUE_ASSISTANT_PREFIX)
    );
}

#[test]
fn empty_forced_prefix_counts_as_absent() {
    let wrapper = InnerMonologueWrapper::new(WrapperConfig {
        assistant_prefix_extra: Some(String::new()),
        assistant_prefix_extra_first_message: None,
        ..WrapperConfig::default()
    });

    assert_eq!(wrapper.forced_prefix(false), None);
    assert_eq!(wrapper.forced_prefix(true), None);

    let prompt = wrapper
        .compile(&[Message::system("sys")], &[], false, None)
        .unwrap_or_else(|error| panic!("compile failed: {error}"));
    assert!(prompt.ends_with("<|im_start|>assistant"));
}

#[test]
fn config_deserializes_with_defaults() {
    let config: WrapperConfig =
        serde_json::from_str("{}").unwrap_or_else(|error| panic!("deserialize failed: {error}"));
    assert_eq!(config, WrapperConfig::default());

    let config: WrapperConfig = serde_json::from_value(json!({
        "json_indent": 4,
        "allow_function_role": true,
        "assistant_prefix_extra": null,
    }))
    .unwrap_or_else(|error| panic!("deserialize failed: {error}"));
    assert_eq!(config.json_indent, 4);
    assert!(config.allow_function_role);
    assert_eq!(config.assistant_prefix_extra, None);
    assert!(config.clean_function_args);
    assert_eq!(config.no_function_role_role, "assistant");
}

#[test]
fn outer_monologue_config_only_swaps_prefix() {
    let outer = WrapperConfig::outer_monologue();
    let standard = WrapperConfig::default();

    assert_eq!(
        outer.assistant_prefix_extra.as_deref(),
        Some(OUTER_MONOLOGUE_ASSISTANT_PREFIX)
    );
    assert_eq!(
        WrapperConfig {
            assistant_prefix_extra: standard.assistant_prefix_extra.clone(),
            ..outer
        },
        standard
    );
}

#[test]
fn parsed_reply_becomes_assistant_message() {
    let reply = ParsedReply {
        inner_thoughts: Some("checking state".to_string()),
        function_call: Some(lookup_call()),
    };

    let message = reply.into_message();

    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.text(), "checking state");
    assert_eq!(message.function_call, Some(lookup_call()));
    assert!(message.tool_calls.is_none());

    let encoded = serde_json::to_value(&message)
        .unwrap_or_else(|error| panic!("serialize failed: {error}"));
    assert_eq!(
        encoded,
        json!({
            "role": "assistant",
            "content": "checking state",
            "function_call": {"name": "lookup", "arguments": "{\"id\":42}"},
        })
    );
}

#[test]
fn function_call_arguments_keep_insertion_order() {
    let mut arguments = Map::new();
    arguments.insert("zeta".to_string(), json!(1));
    arguments.insert("alpha".to_string(), json!(2));

    let call = FunctionCall::new("ordered", &arguments);

    assert_eq!(call.arguments, r#"{"zeta":1,"alpha":2}"#);
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-schema description of one callable function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Function name the model must emit.
    pub name: String,
    /// Human-readable purpose.
    #[serde(default)]
    pub description: String,
    /// Parameter object schema.
    #[serde(default)]
    pub parameters: FunctionParameters,
}

/// `parameters` block of a function schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameters {
    /// Always `object` for function parameters.
    #[serde(rename = "type", default = "object_type")]
    pub typ: String,
    /// Parameter name to property schema, in declaration order.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Names of required parameters.
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for FunctionParameters {
    fn default() -> Self {
        Self {
            typ: object_type(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

fn object_type() -> String {
    "object".to_string()
}

impl FunctionSchema {
    /// Schema with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: FunctionParameters::default(),
        }
    }

    /// Append a parameter; `required` marks it in the `required` list.
    #[must_use]
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        typ: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        let mut property = Map::new();
        property.insert("type".to_string(), Value::String(typ.into()));
        property.insert("description".to_string(), Value::String(description.into()));
        if required {
            self.parameters.required.push(name.clone());
        }
        self.parameters
            .properties
            .insert(name, Value::Object(property));
        self
    }

    /// `(name, description)` pairs in declaration order.
    ///
    /// Properties without a string `description` yield an empty description.
    pub fn param_descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters.properties.iter().map(|(name, property)| {
            let description = property
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            (name.as_str(), description)
        })
    }
}

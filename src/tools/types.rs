//! Tool parameter schemas and declared tool specifications.

use serde::{Deserialize, Serialize};

use crate::provider::ToolDefinition;

/// JSON Schema-based parameter definition for a tool.
///
/// `properties` names every accepted argument; `required` lists the ones with
/// no default value. Together they form the tool's call signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentToolParameters {
    pub schema: serde_json::Value,
}

impl AgentToolParameters {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// Create an empty parameter schema (no parameters).
    pub fn empty() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for constructing tool parameter schemas.
pub struct ParameterBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(mut self, name: impl Into<String>, schema: serde_json::Value, required: bool) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add a string property.
    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "string", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add an integer property.
    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "integer", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add a boolean property.
    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "boolean", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Build into AgentToolParameters.
    pub fn build(self) -> AgentToolParameters {
        AgentToolParameters {
            schema: serde_json::json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// A tool as declared in an agent profile: what the model is told it may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub required: Vec<String>,
}

fn empty_object_schema() -> serde_json::Value {
    AgentToolParameters::empty().schema
}

impl ToolSpec {
    /// Definition sent to the completion service.
    ///
    /// A top-level `required` list is folded into the parameter schema when
    /// the schema does not carry its own.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut parameters = self.parameters.clone();
        if let Some(obj) = parameters.as_object_mut() {
            if !obj.contains_key("required") && !self.required.is_empty() {
                obj.insert("required".into(), serde_json::json!(self.required));
            }
        }
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters,
        }
    }
}

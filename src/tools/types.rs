//! Tool parameter schemas and the wire definition sent in `session.update`.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// JSON Schema describing a tool's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameters {
    pub schema: Value,
}

impl ToolParameters {
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for object parameter schemas.
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, "string", description, required)
    }

    pub fn number(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, "number", description, required)
    }

    fn property(mut self, name: &str, kind: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            json!({ "type": kind, "description": description }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// Tool entry of the realtime session configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: &ToolParameters) -> Self {
        Self {
            kind: "function",
            name: name.to_string(),
            description: description.to_string(),
            parameters: parameters.schema.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_required_properties() {
        let params = ToolParameters::object()
            .number("lat", "Latitude", true)
            .string("note", "Optional note", false)
            .build();

        assert_eq!(params.schema["type"], "object");
        assert_eq!(params.schema["properties"]["lat"]["type"], "number");
        assert_eq!(params.schema["required"], json!(["lat"]));
    }

    #[test]
    fn definition_serializes_as_function() {
        let params = ToolParameters::object().build();
        let definition = ToolDefinition::function("noop", "Does nothing", &params);
        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["name"], "noop");
        assert_eq!(value["parameters"]["type"], "object");
    }
}

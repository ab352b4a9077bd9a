//! Tool abstraction: a callable plus a JSON-Schema-like parameter
//! description, registered by name in a [`crate::cloudllm::Router`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cloudllm::error::ToolError;

/// JSON-Schema primitive types a tool parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// One entry of a tool's `parameters.properties` map, built with a fluent
/// builder.
#[derive(Debug, Clone)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<Value>>,
    pub items: Option<Box<ToolParameter>>,
    pub properties: Option<Vec<ToolParameter>>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            default: None,
            enum_values: None,
            items: None,
            properties: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// A declared default removes this parameter from `required` — a tool
    /// call omitting it is valid, the default fills the schema's property.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self.required = false;
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_items(mut self, items: ToolParameter) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_properties(mut self, properties: Vec<ToolParameter>) -> Self {
        self.properties = Some(properties);
        self
    }

    fn to_schema_value(&self) -> Value {
        let mut obj = Map::new();
        let type_name = match self.param_type {
            ToolParameterType::String => "string",
            ToolParameterType::Number => "number",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        };
        obj.insert("type".to_string(), Value::String(type_name.to_string()));
        if let Some(description) = &self.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        if let Some(enum_values) = &self.enum_values {
            obj.insert("enum".to_string(), Value::Array(enum_values.clone()));
        }
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if let Some(items) = &self.items {
            obj.insert("items".to_string(), items.to_schema_value());
        }
        if let Some(properties) = &self.properties {
            let mut props = Map::new();
            let mut required = Vec::new();
            for prop in properties {
                props.insert(prop.name.clone(), prop.to_schema_value());
                if prop.required {
                    required.push(Value::String(prop.name.clone()));
                }
            }
            obj.insert("properties".to_string(), Value::Object(props));
            if !required.is_empty() {
                obj.insert("required".to_string(), Value::Array(required));
            }
        }
        Value::Object(obj)
    }
}

/// The structured result a tool's callable may return on the richer path —
/// an optional list of attachments alongside the string output ultimately
/// fed back to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub output: String,
    pub attachments: Vec<crate::cloudllm::context::Attachment>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<crate::cloudllm::context::Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// A callable registered by name with a `Router`, advertised to the model
/// as a JSON-Schema tool and invoked with the model-supplied arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// The declared parameters, used to build this tool's JSON schema.
    fn parameters(&self) -> &[ToolParameter];
    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError>;

    /// The richer path (§4.3): a tool that needs to hand back non-text
    /// payloads alongside its string output overrides this instead of
    /// `execute`. Defaults to wrapping `execute`'s result with no
    /// attachments, so a plain `Tool` impl needs no change to keep working.
    async fn execute_rich(&self, args: Map<String, Value>) -> Result<ToolResult, ToolError> {
        self.execute(args).await.map(ToolResult::success)
    }

    /// `{name, description, parameters}` in the shape every adapter expects.
    fn to_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.parameters() {
            properties.insert(param.name.clone(), param.to_schema_value());
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        let mut parameters = Map::new();
        parameters.insert("type".to_string(), Value::String("object".to_string()));
        parameters.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            parameters.insert("required".to_string(), Value::Array(required));
        }

        let mut schema = Map::new();
        schema.insert("name".to_string(), Value::String(self.name().to_string()));
        schema.insert(
            "description".to_string(),
            Value::String(self.description().to_string()),
        );
        schema.insert("parameters".to_string(), Value::Object(parameters));
        Value::Object(schema)
    }
}

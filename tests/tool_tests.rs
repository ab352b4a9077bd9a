//! Schema derivation for `Tool`/`ToolParameter`: type mapping, enums,
//! defaults, and nested array/object shapes.

use async_trait::async_trait;
use cloudllm::{Tool, ToolError, ToolParameter, ToolParameterType};
use serde_json::{Map, Value};

struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Look up the current weather for a city."
    }

    fn parameters(&self) -> &[ToolParameter] {
        static PARAMS: std::sync::OnceLock<Vec<ToolParameter>> = std::sync::OnceLock::new();
        PARAMS.get_or_init(|| {
            vec![
                ToolParameter::new("city", ToolParameterType::String)
                    .with_description("City name")
                    .required(),
                ToolParameter::new("units", ToolParameterType::String)
                    .with_enum(vec![Value::String("celsius".into()), Value::String("fahrenheit".into())])
                    .with_default(Value::String("celsius".into())),
                ToolParameter::new("days", ToolParameterType::Integer).with_default(Value::from(1)),
            ]
        })
    }

    async fn execute(&self, _args: Map<String, Value>) -> Result<String, ToolError> {
        Ok("sunny".to_string())
    }
}

#[test]
fn required_params_appear_in_schema_required_array() {
    let schema = WeatherTool.to_schema();
    assert_eq!(schema["name"], "get_weather");
    let required = schema["parameters"]["required"].as_array().unwrap();
    assert_eq!(required.len(), 1);
    assert_eq!(required[0], "city");
}

#[test]
fn default_values_are_present_and_remove_the_parameter_from_required() {
    let schema = WeatherTool.to_schema();
    let units = &schema["parameters"]["properties"]["units"];
    assert_eq!(units["default"], "celsius");
    assert_eq!(units["enum"].as_array().unwrap().len(), 2);

    let required: Vec<&str> = schema["parameters"]["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(!required.contains(&"units"));
    assert!(!required.contains(&"days"));
}

#[test]
fn nested_array_and_object_parameters_recurse_into_items_and_properties() {
    let tags = ToolParameter::new("tags", ToolParameterType::Array)
        .with_items(ToolParameter::new("tag", ToolParameterType::String));
    let location = ToolParameter::new("location", ToolParameterType::Object).with_properties(vec![
        ToolParameter::new("lat", ToolParameterType::Number).required(),
        ToolParameter::new("lon", ToolParameterType::Number).required(),
    ]);

    struct SearchTool {
        params: Vec<ToolParameter>,
    }

    #[async_trait]
    impl Tool for SearchTool {
        fn name(&self) -> &str {
            "search"
        }
        fn description(&self) -> &str {
            "Search with structured filters."
        }
        fn parameters(&self) -> &[ToolParameter] {
            &self.params
        }
        async fn execute(&self, _args: Map<String, Value>) -> Result<String, ToolError> {
            Ok(String::new())
        }
    }

    let tool = SearchTool {
        params: vec![tags, location],
    };
    let schema = tool.to_schema();
    let props = &schema["parameters"]["properties"];
    assert_eq!(props["tags"]["type"], "array");
    assert_eq!(props["tags"]["items"]["type"], "string");
    assert_eq!(props["location"]["type"], "object");
    let nested_required: Vec<&str> = props["location"]["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(nested_required, vec!["lat", "lon"]);
}

#[tokio::test]
async fn execute_runs_the_registered_callable() {
    let result = WeatherTool.execute(Map::new()).await.unwrap();
    assert_eq!(result, "sunny");
}

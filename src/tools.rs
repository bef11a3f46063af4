//! Locally executed tools the model may call.

use crate::types::ToolDefinition;
use crate::Error;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type Handler = Arc<dyn Fn(Value) -> Result<String, Error> + Send + Sync>;

/// A tool: its definition as sent to the model plus the local handler.
#[derive(Clone)]
pub struct ToolSpec {
    definition: ToolDefinition,
    handler: Handler,
}

impl ToolSpec {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<String, Error> + Send + Sync + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Run the handler with already parsed arguments.
    pub fn call(&self, arguments: Value) -> Result<String, Error> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

/// Tools registered for one request, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(mut self, tool: ToolSpec) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Run a tool by name with raw JSON arguments as sent by the model.
    pub fn call(&self, name: &str, arguments: &str) -> Result<String, Error> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::tool(name, "unknown tool"))?;

        let arguments = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| Error::tool(name, format!("invalid arguments: {e}")))?
        };

        tool.call(arguments)
    }
}

impl FromIterator<ToolSpec> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolSpec>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::register)
    }
}

#[derive(Deserialize)]
struct NumberPair {
    a: f64,
    b: f64,
}

fn number_pair_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "description": "The first number"},
            "b": {"type": "number", "description": "The second number"}
        },
        "required": ["a", "b"],
        "additionalProperties": false
    })
}

fn parse_pair(name: &str, arguments: Value) -> Result<NumberPair, Error> {
    serde_json::from_value(arguments).map_err(|e| Error::tool(name, e.to_string()))
}

/// `add_numbers(a, b)` returns `Sum: <a + b>`.
pub fn add_numbers() -> ToolSpec {
    ToolSpec::new(
        "add_numbers",
        "Add two numbers and return the sum.",
        number_pair_schema(),
        |arguments| {
            let NumberPair { a, b } = parse_pair("add_numbers", arguments)?;
            Ok(format!("Sum: {}", a + b))
        },
    )
}

/// `multiply_numbers(a, b)` returns `Product: <a * b>`.
pub fn multiply_numbers() -> ToolSpec {
    ToolSpec::new(
        "multiply_numbers",
        "Multiply two numbers and return the result.",
        number_pair_schema(),
        |arguments| {
            let NumberPair { a, b } = parse_pair("multiply_numbers", arguments)?;
            Ok(format!("Product: {}", a * b))
        },
    )
}

/// `get_utc_time()` returns the current time in RFC 3339.
pub fn get_utc_time() -> ToolSpec {
    ToolSpec::new(
        "get_utc_time",
        "Get the current UTC timestamp.",
        json!({"type": "object", "properties": {}, "additionalProperties": false}),
        |_| {
            Ok(format!(
                "UTC time: {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
            ))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tools() {
        let registry: ToolRegistry = [add_numbers(), multiply_numbers(), get_utc_time()]
            .into_iter()
            .collect();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.call("add_numbers", r#"{"a":21,"b":21}"#).unwrap(), "Sum: 42");
        assert_eq!(
            registry.call("multiply_numbers", r#"{"a":7,"b":8}"#).unwrap(),
            "Product: 56"
        );
        assert_eq!(registry.call("add_numbers", r#"{"a":0.5,"b":1}"#).unwrap(), "Sum: 1.5");

        let time = registry.call("get_utc_time", "").unwrap();
        assert!(time.starts_with("UTC time: "));
        assert!(time.ends_with('Z'));
    }

    #[test]
    fn test_definitions_are_sorted_by_name() {
        let registry = ToolRegistry::new()
            .register(multiply_numbers())
            .register(get_utc_time());
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["get_utc_time", "multiply_numbers"]);
    }

    #[test]
    fn test_call_failures() {
        let registry = ToolRegistry::new().register(add_numbers());

        let error = registry.call("nope", "{}").unwrap_err();
        assert_eq!(error.to_string(), "Tool error: nope - unknown tool");

        let error = registry.call("add_numbers", "{not json").unwrap_err();
        assert!(error.to_string().contains("invalid arguments"));

        let error = registry.call("add_numbers", r#"{"a":1}"#).unwrap_err();
        assert!(matches!(error, Error::Tool { .. }));
    }
}

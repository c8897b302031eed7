//! Local tools an assistant can call.
//!
//! Tools take and return plain strings. The model addresses a tool by its
//! normalised name and wraps the input in a `{"__arg1": ...}` envelope, which
//! [`extract_arg1`] unwraps before the tool sees it.

pub mod echo;
pub mod scraper;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    base::types::Res,
    service::assistants::types::{AssistantTool, FunctionDefinition},
};

/// Longest function name the API accepts.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Key of the single string argument every tool receives.
pub const ARG1: &str = "__arg1";

// Traits.

/// Generic tool trait that local tools must implement.
#[async_trait]
pub trait GenericTool: Send + Sync + 'static {
    /// Human readable name. The registry normalises it before advertising it.
    fn name(&self) -> &str;

    /// What the tool does, shown to the model.
    fn description(&self) -> &str;

    /// Run the tool on its (already unwrapped) input.
    async fn call(&self, input: &str) -> Res<String>;
}

// Structs.

/// The set of tools available to a run, keyed by normalised name.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn GenericTool>>>,
    order: Arc<Vec<String>>,
}

impl ToolRegistry {
    /// Build a registry, rejecting tools whose normalised names are empty or collide.
    pub fn new(tools: Vec<Arc<dyn GenericTool>>) -> Res<Self> {
        let mut map = HashMap::with_capacity(tools.len());
        let mut order = Vec::with_capacity(tools.len());

        for tool in tools {
            let name = format_tool_name(tool.name());

            if name.is_empty() {
                return Err(anyhow::anyhow!("Tool `{}` has no usable name.", tool.name()));
            }

            if map.contains_key(&name) {
                return Err(anyhow::anyhow!("Duplicate tool name `{name}`."));
            }

            order.push(name.clone());
            map.insert(name, tool);
        }

        Ok(Self {
            tools: Arc::new(map),
            order: Arc::new(order),
        })
    }

    /// Look up a tool by the name the model used.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn GenericTool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Normalised names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Function definitions to enable on an assistant or a run, in registration order.
    pub fn definitions(&self) -> Vec<AssistantTool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|tool| (name, tool)))
            .map(|(name, tool)| AssistantTool::Function {
                function: FunctionDefinition {
                    name: name.clone(),
                    description: Some(tool.description().to_string()),
                    parameters: Some(arg1_schema()),
                    strict: None,
                },
            })
            .collect()
    }
}

// Helpers.

/// JSON schema of the `{"__arg1": string}` envelope.
pub fn arg1_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            ARG1: { "title": ARG1, "type": "string" },
        },
        "required": [ARG1],
    })
}

/// Normalise a tool name to what the API accepts.
///
/// Spaces become `_`, other characters outside `[a-zA-Z0-9_-]` are dropped, and
/// the result is cut to [`MAX_TOOL_NAME_LEN`] characters.
pub fn format_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_TOOL_NAME_LEN)
        .collect()
}

/// Unwrap the string argument from a tool call's JSON arguments.
pub fn extract_arg1(arguments: &str) -> Res<String> {
    let value: Value = serde_json::from_str(arguments).map_err(|e| anyhow::anyhow!("Tool arguments are not valid JSON: {e}"))?;

    value
        .get(ARG1)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Tool arguments carry no string `{ARG1}`."))
}

/// Wrap a string argument the way the model sends it.
pub fn wrap_arg1(input: &str) -> String {
    json!({ ARG1: input }).to_string()
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tools::echo::EchoTool;

    struct NamedTool(&'static str);

    #[async_trait]
    impl GenericTool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test"
        }

        async fn call(&self, input: &str) -> Res<String> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn test_format_tool_name() {
        assert_eq!(format_tool_name("Web Scraper"), "Web_Scraper");
        assert_eq!(format_tool_name("what's up?"), "whats_up");
        assert_eq!(format_tool_name("ok-name_1"), "ok-name_1");
        assert_eq!(format_tool_name(&"x".repeat(100)).len(), MAX_TOOL_NAME_LEN);
        assert_eq!(format_tool_name("çã"), "");
    }

    #[test]
    fn test_arg1_envelope() {
        let input = "look at https://example.com/ \"now\"\nplease";

        assert_eq!(extract_arg1(&wrap_arg1(input)).unwrap(), input);
        assert_eq!(extract_arg1(r#"{"__arg1":"hi","other":1}"#).unwrap(), "hi");
        assert!(extract_arg1(r#"{"query":"hi"}"#).is_err());
        assert!(extract_arg1(r#"{"__arg1":3}"#).is_err());
        assert!(extract_arg1("not json").is_err());
    }

    #[test]
    fn test_registry_rejects_duplicates_after_normalising() {
        let tools: Vec<Arc<dyn GenericTool>> = vec![Arc::new(NamedTool("Web Scraper")), Arc::new(NamedTool("Web_Scraper"))];

        assert!(ToolRegistry::new(tools).is_err());
    }

    #[test]
    fn test_registry_rejects_empty_names() {
        let tools: Vec<Arc<dyn GenericTool>> = vec![Arc::new(NamedTool("???"))];

        assert!(ToolRegistry::new(tools).is_err());
    }

    #[test]
    fn test_registry_definitions_follow_registration_order() {
        let tools: Vec<Arc<dyn GenericTool>> = vec![Arc::new(NamedTool("Web Scraper")), Arc::new(EchoTool)];
        let registry = ToolRegistry::new(tools).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Web_Scraper", "echo"]);
        assert!(registry.get("Web_Scraper").is_some());
        assert!(registry.get("Web Scraper").is_none());

        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 2);

        let AssistantTool::Function { function } = &definitions[0] else {
            panic!("expected a function tool");
        };
        assert_eq!(function.name, "Web_Scraper");
        assert_eq!(function.parameters.as_ref(), Some(&arg1_schema()));
    }
}

//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: each one has a unique
//! name and is invoked with a string-keyed argument mapping decoded from the
//! model's tagged output.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Arguments for a tool call: string keys, dynamically-typed values.
pub type ToolArgs = serde_json::Map<String, Value>;

/// What the system prompt is told about a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,
}

/// The core Tool trait.
///
/// A failure of any kind is reported as a [`ToolError`]; the runtime does
/// not distinguish causes.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "add", "lookup").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Invoke the tool with decoded arguments.
    async fn call(&self, args: ToolArgs) -> std::result::Result<Value, ToolError>;

    /// Convert this tool into a ToolDescriptor for prompt rendering.
    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

type ToolFn = dyn Fn(&ToolArgs) -> std::result::Result<Value, ToolError> + Send + Sync;

/// A tool backed by a synchronous closure.
pub struct FnTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ToolArgs) -> std::result::Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, args: ToolArgs) -> std::result::Result<Value, ToolError> {
        (self.func)(&args)
    }
}

/// A registry of available tools, keyed by unique name.
///
/// Names are kept sorted so that listings fed back to the model are stable.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Box::new(tool));
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Descriptors for every registered tool (for the system prompt).
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.to_descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a tool result as conversation text.
///
/// Strings are inserted bare; every other value is rendered as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Largest magnitude below 2^53 at which every whole `f64` is exact.
const EXACT_INTEGER_LIMIT: f64 = 9.0e15;

/// A numeric tool result as JSON: whole values become integers so they
/// render as `5`, not `5.0`.
pub fn number_value(result: f64) -> Value {
    if result.fract() == 0.0 && result.abs() < EXACT_INTEGER_LIMIT {
        Value::from(result as i64)
    } else {
        Value::from(result)
    }
}

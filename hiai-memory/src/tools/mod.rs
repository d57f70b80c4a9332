//! Tool definitions exposing the memory store to an assistant host.
//!
//! A tool is a [`ToolSpec`] (name, description, argument schema) paired with
//! a handler that turns the argument object into a [`ToolOutput`]. The
//! registry wraps every output in the host's content envelope:
//!
//! ```json
//! { "content": [{ "type": "text", "text": "Memory recalled:\n{ ... }" }] }
//! ```
//!
//! The host transport (stdio, HTTP, ...) is not part of this crate; it only
//! needs [`ToolRegistry::export_schema`] to advertise the tools and
//! [`ToolRegistry::execute`] to run them.
//!
//! - **memory**: record CRUD, search, priorities and statistics
//! - **graph**: relations, neighborhoods, paths and graph projections
//! - **context**: session context save/restore and importance triage

mod memory;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub use memory::{
    AutoSaveContextInput, FindPathInput, GetRelationsInput, KeyInput, LinkInput, ListInput,
    MemoryGraphInput, PrioritizeInput, PriorityInput, RelatedInput, RestoreContextInput,
    RestoreLevel, SaveInput, SearchAdvancedInput, SearchInput, SetPriorityInput, TimelineInput,
    UnlinkInput, UpdateInput, Urgency,
};

/// Which group of tools a spec belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Memory,
    Graph,
    Context,
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Graph => write!(f, "graph"),
            Self::Context => write!(f, "context"),
        }
    }
}

/// Definition of a tool as advertised to the host.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub category: ToolCategory,
    /// JSON Schema of the argument object.
    pub input_schema: Value,
    /// The tool removes stored data.
    pub destructive: bool,
}

impl ToolSpec {
    pub fn new(name: &'static str, category: ToolCategory, description: &'static str) -> Self {
        Self {
            name,
            description,
            category,
            input_schema: json!({ "type": "object", "properties": {} }),
            destructive: false,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    /// Listing entry for this tool.
    fn advertised(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
            "annotations": {
                "destructiveHint": self.destructive,
            },
        })
    }
}

/// Result of a tool handler, before it is wrapped for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A label line followed by a pretty-printed JSON document.
    Report { label: String, body: String },
    /// A single line of text, used for misses and rejections.
    Message(String),
}

impl ToolOutput {
    pub fn report(label: impl Into<String>, payload: &impl Serialize) -> Result<Self> {
        Ok(Self::Report {
            label: label.into(),
            body: serde_json::to_string_pretty(payload)?,
        })
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// The text the host will display.
    pub fn into_text(self) -> String {
        match self {
            Self::Report { label, body } => format!("{}:\n{}", label, body),
            Self::Message(text) => text,
        }
    }

    fn into_content(self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.into_text() }]
        })
    }
}

/// Handler invoked with the raw argument object.
pub type ToolHandler = Arc<dyn Fn(Value) -> Result<ToolOutput> + Send + Sync>;

struct Registered {
    spec: ToolSpec,
    handler: ToolHandler,
}

/// Tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Registered>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, spec: ToolSpec, handler: ToolHandler) {
        self.tools.insert(spec.name, Registered { spec, handler });
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    /// Every spec, ordered by name.
    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values().map(|t| &t.spec)
    }

    pub fn specs_in(&self, category: ToolCategory) -> Vec<&ToolSpec> {
        self.specs().filter(|s| s.category == category).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool and wrap its output in the content envelope.
    pub fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        let output = (tool.handler)(input)?;
        if let ToolOutput::Message(text) = &output {
            debug!(tool = name, message = %text, "Tool returned message");
        }
        Ok(output.into_content())
    }

    /// Tool listing suitable for a host's `tools/list` response.
    pub fn export_schema(&self) -> Value {
        let tools: Vec<Value> = self.specs().map(ToolSpec::advertised).collect();
        json!({ "tools": tools })
    }
}

/// The text of the first content block of an executed result, if any.
pub fn result_text(result: &Value) -> Option<&str> {
    result
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
}

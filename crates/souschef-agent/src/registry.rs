//! Named retrieval tools exposed to the routing agent.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use souschef_core::error::{Error, Result};
use souschef_vector::Retriever;

/// Handle to a registered tool, obtained from [`ToolRegistry::resolve`].
///
/// Only the registry that issued it can turn it back into a [`Tool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToolId(usize);

pub struct Tool {
    name: String,
    description: String,
    bound_collection: String,
    retriever: Arc<Retriever>,
}

impl Tool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn bound_collection(&self) -> &str {
        &self.bound_collection
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Text to search for. Defaults to the user's question."
                    }
                }
            }),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("bound_collection", &self.bound_collection)
            .finish_non_exhaustive()
    }
}

/// What the language model sees of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tools in registration order with unique names.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool that searches `collection` through `retriever`.
    ///
    /// Fails with [`Error::DuplicateName`] when `name` is taken; the registry
    /// is left untouched on any error.
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        collection: &str,
        retriever: Arc<Retriever>,
    ) -> Result<ToolId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("tool name must not be empty".into()));
        }
        if description.trim().is_empty() {
            return Err(Error::InvalidArgument(format!("tool '{name}' needs a description")));
        }
        if self.by_name.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        let id = ToolId(self.tools.len());
        self.by_name.insert(name.to_string(), id.0);
        self.tools.push(Tool {
            name: name.to_string(),
            description: description.trim().to_string(),
            bound_collection: collection.to_string(),
            retriever,
        });
        info!(tool = name, collection, "registered tool");
        Ok(id)
    }

    /// Registered tools in registration order.
    pub fn list(&self) -> &[Tool] {
        &self.tools
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(Tool::spec).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Map a tool name chosen by the model to its handle.
    pub fn resolve(&self, name: &str) -> Result<ToolId> {
        self.by_name.get(name.trim()).map(|&i| ToolId(i)).ok_or_else(|| Error::UnknownTool(name.to_string()))
    }

    pub fn get(&self, id: ToolId) -> Option<&Tool> {
        self.tools.get(id.0)
    }
}

//! Language model interface consumed by the routing agent.

use async_trait::async_trait;
use serde::Serialize;

use souschef_core::error::Result;

use crate::registry::ToolSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ToolSelection,
    AnswerComposition,
}

/// A retrieved passage as presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub tool: String,
    pub collection: String,
    pub chunk_id: String,
    pub source_path: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub stage: Stage,
    pub query: String,
    /// Rendered prompt text for models that take plain text.
    pub text: String,
    /// Passages retrieved so far in this turn, in retrieval order.
    pub context: Vec<Passage>,
    /// How many tools may be chosen in this round.
    pub max_tool_calls: usize,
}

/// A tool the model asked to invoke. `query` overrides the retrieval text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub query: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), query: None }
    }

    pub fn with_query(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self { name: name.into(), query: Some(query.into()) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub tool_calls: Vec<ToolCall>,
    pub answer: Option<String>,
}

impl Generation {
    pub fn answer(text: impl Into<String>) -> Self {
        Self { tool_calls: Vec::new(), answer: Some(text.into()) }
    }

    pub fn call(call: ToolCall) -> Self {
        Self { tool_calls: vec![call], answer: None }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// `tools` is empty during answer composition.
    async fn generate(&self, prompt: &Prompt, tools: &[ToolSpec]) -> Result<Generation>;
}

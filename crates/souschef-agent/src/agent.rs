//! Single-turn routing agent.
//!
//! One call to [`RoutingAgent::answer`] walks
//! `Idle → ToolSelection → ToolExecution → AnswerComposition → Idle` and
//! returns either a composed answer or a typed error. Nothing is kept
//! between calls.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use souschef_core::config::Settings;
use souschef_core::error::{Error, Result};
use souschef_core::types::ScoredChunk;

use crate::model::{Generation, LanguageModel, Passage, Prompt, Stage, ToolCall};
use crate::prompt::PromptRenderer;
use crate::registry::{ToolRegistry, ToolSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    ToolSelection,
    ToolExecution,
    AnswerComposition,
}

/// How many tools a turn may use.
///
/// With `allow_parallel_tool_calls` off only the first tool the model picks
/// in a round is run. `max_selection_rounds > 1` lets the model pick again
/// after seeing results (sequential multi-hop retrieval).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub allow_parallel_tool_calls: bool,
    pub max_tool_calls: usize,
    pub max_selection_rounds: usize,
    pub generate_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { allow_parallel_tool_calls: false, max_tool_calls: 1, max_selection_rounds: 1, generate_timeout: None }
    }
}

impl AgentConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            allow_parallel_tool_calls: settings.allow_parallel_tool_calls,
            max_tool_calls: settings.max_tool_calls,
            max_selection_rounds: settings.max_selection_rounds,
            generate_timeout: settings.timeouts.generate(),
        }
    }

    fn calls_per_round(&self) -> usize {
        if self.allow_parallel_tool_calls { self.max_tool_calls.max(1) } else { 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub collection: String,
    pub query: String,
    pub results: Vec<ScoredChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAnswer {
    pub query: String,
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// States visited, starting and ending with `Idle`.
    pub states: Vec<AgentState>,
}

impl AgentAnswer {
    pub fn visited(&self, state: AgentState) -> bool {
        self.states.contains(&state)
    }
}

pub struct RoutingAgent {
    registry: Arc<ToolRegistry>,
    model: Arc<dyn LanguageModel>,
    prompts: PromptRenderer,
    config: AgentConfig,
}

impl RoutingAgent {
    pub fn new(registry: Arc<ToolRegistry>, model: Arc<dyn LanguageModel>, config: AgentConfig) -> Result<Self> {
        if config.max_selection_rounds == 0 {
            return Err(Error::InvalidConfig("max_selection_rounds must be at least 1".into()));
        }
        Ok(Self { registry, model, prompts: PromptRenderer::new()?, config })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn answer(&self, query: &str) -> Result<AgentAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }
        info!(query, model = self.model.model_id(), tools = self.registry.len(), "agent turn");

        let mut states = vec![AgentState::Idle];
        let mut context: Vec<Passage> = Vec::new();
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut direct_answer = None;

        if !self.registry.is_empty() {
            let specs = self.registry.specs();
            for round in 0..self.config.max_selection_rounds {
                states.push(AgentState::ToolSelection);
                let generation = self.select(query, &specs, &context).await?;
                let calls = self.limit_calls(generation.tool_calls);
                if calls.is_empty() {
                    debug!(round, "model chose no tool");
                    if records.is_empty() {
                        direct_answer = generation.answer.filter(|a| !a.trim().is_empty());
                    }
                    break;
                }
                states.push(AgentState::ToolExecution);
                for call in calls {
                    let record = self.execute(query, call).await?;
                    context.extend(record.results.iter().map(|hit| Passage {
                        tool: record.tool.clone(),
                        collection: record.collection.clone(),
                        chunk_id: hit.chunk.id.clone(),
                        source_path: hit.chunk.source_path.clone(),
                        text: hit.chunk.text.clone(),
                        score: hit.score,
                    }));
                    records.push(record);
                }
            }
        }

        states.push(AgentState::AnswerComposition);
        let answer = match direct_answer {
            Some(answer) => answer,
            None => self.compose(query, &context).await?,
        };
        states.push(AgentState::Idle);
        info!(tool_calls = records.len(), "agent turn complete");
        Ok(AgentAnswer { query: query.to_string(), answer, tool_calls: records, states })
    }

    async fn select(&self, query: &str, specs: &[ToolSpec], context: &[Passage]) -> Result<Generation> {
        let max_tool_calls = self.config.calls_per_round();
        let prompt = Prompt {
            stage: Stage::ToolSelection,
            query: query.to_string(),
            text: self.prompts.selection(query, specs, context, max_tool_calls)?,
            context: context.to_vec(),
            max_tool_calls,
        };
        self.generate(&prompt, specs).await
    }

    async fn compose(&self, query: &str, context: &[Passage]) -> Result<String> {
        let prompt = Prompt {
            stage: Stage::AnswerComposition,
            query: query.to_string(),
            text: self.prompts.composition(query, context)?,
            context: context.to_vec(),
            max_tool_calls: 0,
        };
        let generation = self.generate(&prompt, &[]).await?;
        if !generation.tool_calls.is_empty() {
            warn!(calls = generation.tool_calls.len(), "ignoring tool calls requested during answer composition");
        }
        generation
            .answer
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Error::model(self.model.model_id(), "no answer was produced"))
    }

    fn limit_calls(&self, mut calls: Vec<ToolCall>) -> Vec<ToolCall> {
        let limit = self.config.calls_per_round();
        if calls.len() > limit {
            warn!(requested = calls.len(), limit, "model requested more tool calls than allowed; keeping the first");
            calls.truncate(limit);
        }
        calls
    }

    /// Run one tool call. Retrieval failures become [`Error::ToolExecution`];
    /// timeouts are passed through unchanged.
    async fn execute(&self, query: &str, call: ToolCall) -> Result<ToolCallRecord> {
        let tool = self
            .registry
            .resolve(&call.name)
            .and_then(|id| self.registry.get(id).ok_or_else(|| Error::UnknownTool(call.name.clone())))
            .map_err(|e| Error::tool(&call.name, e))?;
        let input = call.query.filter(|q| !q.trim().is_empty()).unwrap_or_else(|| query.to_string());

        debug!(tool = tool.name(), collection = tool.bound_collection(), input = %input, "executing tool");
        let results = tool.retriever().query(tool.bound_collection(), &input).await.map_err(|e| match e {
            e @ Error::Timeout { .. } => e,
            other => Error::tool(tool.name(), other),
        })?;
        Ok(ToolCallRecord {
            tool: tool.name().to_string(),
            collection: tool.bound_collection().to_string(),
            query: input,
            results,
        })
    }

    async fn generate(&self, prompt: &Prompt, tools: &[ToolSpec]) -> Result<Generation> {
        let fut = self.model.generate(prompt, tools);
        match self.config.generate_timeout {
            None => fut.await,
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| Error::Timeout { operation: format!("generation with {}", self.model.model_id()), after })?,
        }
    }
}

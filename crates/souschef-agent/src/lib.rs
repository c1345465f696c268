//! Tool registry and routing agent for retrieval-augmented culinary queries.

use std::sync::Arc;

use souschef_core::config::Settings;
use souschef_core::error::{Error, Result};

pub mod agent;
pub mod model;
pub mod offline;
pub mod prompt;
pub mod registry;

pub use agent::{AgentAnswer, AgentConfig, AgentState, RoutingAgent, ToolCallRecord};
pub use model::{Generation, LanguageModel, Passage, Prompt, Stage, ToolCall};
pub use offline::ExtractiveModel;
pub use registry::{Tool, ToolId, ToolRegistry, ToolSpec};

/// The language model named by `settings.language_model_name`.
///
/// Only the offline extractive model is built in; hosted models plug in
/// through [`LanguageModel`].
pub fn build_language_model(settings: &Settings) -> Result<Arc<dyn LanguageModel>> {
    match settings.language_model_name.trim().to_ascii_lowercase().as_str() {
        "extractive" | "offline" => Ok(Arc::new(ExtractiveModel::new())),
        other => Err(Error::InvalidConfig(format!(
            "no client for language model '{other}'; implement LanguageModel for hosted models"
        ))),
    }
}

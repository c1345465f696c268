//! Offline stand-in for a hosted language model.
//!
//! Routing is lexical: a tool scores one point per distinct query term found
//! in its name or description, plus a bonus when the question's phrasing cues
//! a kind of source (definitions vs. recipes). Answers quote the best
//! retrieved passages verbatim.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use souschef_core::error::Result;
use souschef_core::text::terms;

use crate::model::{Generation, LanguageModel, Passage, Prompt, Stage, ToolCall};
use crate::registry::ToolSpec;

const MODEL_ID: &str = "extractive";
const QUOTED_PASSAGES: usize = 2;

/// Question openers and the description terms they point at.
const CUES: &[(&[&str], &[&str])] = &[
    (
        &["what is", "what are", "what's", "define", "meaning of", "who was"],
        &["definition", "definitions", "dictionary", "glossary", "terms"],
    ),
    (
        &["how do", "how to", "how should", "how long", "recipe", "make", "cook", "prepare"],
        &["recipe", "recipes", "cookbook", "cookery", "preparation", "cooking"],
    ),
];

#[derive(Debug, Clone, Default)]
pub struct ExtractiveModel;

impl ExtractiveModel {
    pub fn new() -> Self {
        Self
    }

    fn score_tool(query: &str, query_terms: &HashSet<String>, tool: &ToolSpec) -> usize {
        let tool_terms: HashSet<String> = terms(&format!("{} {}", tool.name, tool.description)).into_iter().collect();
        let overlap = query_terms.intersection(&tool_terms).count();
        let lowered = query.to_lowercase();
        let cue_bonus = CUES
            .iter()
            .filter(|(openers, _)| openers.iter().any(|o| lowered.contains(o)))
            .filter(|(_, targets)| targets.iter().any(|t| tool_terms.contains(*t)))
            .count();
        overlap + cue_bonus
    }

    fn select(prompt: &Prompt, tools: &[ToolSpec]) -> Generation {
        // Only the first round selects; later rounds see context and stop.
        if !prompt.context.is_empty() {
            return Generation::default();
        }
        let query_terms: HashSet<String> = terms(&prompt.query).into_iter().collect();
        let mut scored: Vec<(usize, &ToolSpec)> = tools
            .iter()
            .map(|t| (Self::score_tool(&prompt.query, &query_terms, t), t))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Generation {
            tool_calls: scored.into_iter().take(prompt.max_tool_calls.max(1)).map(|(_, t)| ToolCall::new(&t.name)).collect(),
            answer: None,
        }
    }

    fn compose(prompt: &Prompt) -> Generation {
        if prompt.context.is_empty() {
            return Generation::answer(format!(
                "I have no reference material for \"{}\", so I cannot answer it from the cookbook or the dictionary.",
                prompt.query
            ));
        }
        let mut relevant: Vec<&Passage> = prompt.context.iter().filter(|p| p.score > 0.0).collect();
        relevant.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if relevant.is_empty() {
            let mut consulted: Vec<&str> = prompt.context.iter().map(|p| p.tool.as_str()).collect();
            consulted.dedup();
            return Generation::answer(format!(
                "The consulted sources ({}) contain nothing that matches \"{}\".",
                consulted.join(", "),
                prompt.query
            ));
        }
        let lines: Vec<String> = relevant
            .into_iter()
            .take(QUOTED_PASSAGES)
            .map(|p| format!("According to {} ({}): {}", p.tool, file_name(&p.source_path), p.text))
            .collect();
        Generation::answer(lines.join("\n"))
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path)
}

#[async_trait]
impl LanguageModel for ExtractiveModel {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn generate(&self, prompt: &Prompt, tools: &[ToolSpec]) -> Result<Generation> {
        Ok(match prompt.stage {
            Stage::ToolSelection => Self::select(prompt, tools),
            Stage::AnswerComposition => Self::compose(prompt),
        })
    }
}

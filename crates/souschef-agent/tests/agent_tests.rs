use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use souschef_core::chunker::Chunker;
use souschef_core::error::{Error, Result};
use souschef_core::loader::DocumentLoader;
use souschef_core::traits::EmbeddingProvider;
use souschef_core::types::Document;
use souschef_embed::{HashEmbedder, LocalProvider};
use souschef_vector::{Ingestor, Retriever, RetrieverConfig, VectorIndex};

use souschef_agent::{
    AgentConfig, AgentState, ExtractiveModel, Generation, LanguageModel, Prompt, RoutingAgent, Stage, ToolCall,
    ToolRegistry, ToolSpec,
};

const COOKBOOK: &str = "\
To boil potatoes, put them into cold water with a little salt and simmer until tender.

For a plain roast, baste the joint often and allow a quarter of an hour to the pound.";

const DICTIONARY: &str = "\
Aloo is a word for potato in South Asian cuisine.

Brine: salted water used for pickling vegetables and curing meat.";

/// Replays canned generations and records every prompt it was shown.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Generation>>,
    seen: Mutex<Vec<(Stage, Vec<String>)>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Generation>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), seen: Mutex::default() })
    }

    fn stages(&self) -> Vec<Stage> {
        self.seen.lock().iter().map(|(s, _)| *s).collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &Prompt, tools: &[ToolSpec]) -> Result<Generation> {
        self.seen.lock().push((prompt.stage, tools.iter().map(|t| t.name.clone()).collect()));
        self.replies.lock().pop_front().ok_or_else(|| Error::model("scripted", "script exhausted"))
    }
}

struct Stalled;

#[async_trait]
impl LanguageModel for Stalled {
    fn model_id(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _prompt: &Prompt, _tools: &[ToolSpec]) -> Result<Generation> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Generation::answer("too late"))
    }
}

struct Unreachable;

#[async_trait]
impl EmbeddingProvider for Unreachable {
    fn provider_id(&self) -> &str {
        "unreachable"
    }

    fn dimension(&self) -> usize {
        4
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("unreachable", "connection refused"))
    }
}

struct Hanging;

#[async_trait]
impl EmbeddingProvider for Hanging {
    fn provider_id(&self) -> &str {
        "hanging"
    }

    fn dimension(&self) -> usize {
        4
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(Error::embedding("hanging", "unreachable"))
    }
}

/// A dictionary tool over an empty collection, embedding through `provider`.
fn dictionary_over(provider: Arc<dyn EmbeddingProvider>, config: RetrieverConfig) -> ToolRegistry {
    let index = Arc::new(VectorIndex::new());
    index.create_collection("dictionary", 4).unwrap();
    let retriever = Arc::new(Retriever::new(index, provider, config).unwrap());
    let mut registry = ToolRegistry::new();
    registry.register("Food_Dictionary", "Definitions of food terms.", "dictionary", retriever).unwrap();
    registry
}

fn provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(LocalProvider::new(Arc::new(HashEmbedder::new(1024)), "hash-1024"))
}

fn document(id: &str, text: &str) -> Document {
    Document { id: id.to_string(), source_path: format!("sources/{id}.txt"), raw_text: text.to_string() }
}

/// Index with both collections ingested and a shared retriever.
async fn kitchen() -> Arc<Retriever> {
    let index = Arc::new(VectorIndex::new());
    let ingestor = Ingestor::new(index.clone(), provider(), DocumentLoader::new(), Chunker::default());
    ingestor.ingest_documents("cookbook", &[document("cookbook", COOKBOOK)]).await.unwrap();
    ingestor.ingest_documents("dictionary", &[document("dictionary", DICTIONARY)]).await.unwrap();
    Arc::new(Retriever::new(index, provider(), RetrieverConfig::default()).unwrap())
}

async fn food_registry() -> ToolRegistry {
    let retriever = kitchen().await;
    let mut registry = ToolRegistry::new();
    registry
        .register("Food_Cookbook", "Historical recipes and cooking instructions.", "cookbook", retriever.clone())
        .unwrap();
    registry
        .register("Food_Dictionary", "Definitions of food terms and ingredients.", "dictionary", retriever)
        .unwrap();
    registry
}

#[tokio::test]
async fn duplicate_tool_name_leaves_registry_unchanged() {
    let mut registry = food_registry().await;
    let retriever = kitchen().await;

    let err = registry.register("Food_Cookbook", "Another cookbook.", "cookbook", retriever).unwrap_err();
    assert!(matches!(err, Error::DuplicateName(ref name) if name == "Food_Cookbook"));

    let names: Vec<&str> = registry.list().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["Food_Cookbook", "Food_Dictionary"]);
    assert_eq!(registry.list()[0].description(), "Historical recipes and cooking instructions.");
}

#[tokio::test]
async fn resolve_fails_for_unregistered_names() {
    let registry = food_registry().await;
    assert!(registry.resolve("Food_Dictionary").is_ok());
    assert!(matches!(registry.resolve("Wine_List"), Err(Error::UnknownTool(_))));
}

#[tokio::test]
async fn empty_registry_goes_straight_to_composition() {
    let model = ScriptedModel::new(vec![Generation::answer("Aloo means potato.")]);
    let agent = RoutingAgent::new(Arc::new(ToolRegistry::new()), model.clone(), AgentConfig::default()).unwrap();

    let answer = agent.answer("What is aloo?").await.expect("answer");
    assert_eq!(answer.answer, "Aloo means potato.");
    assert_eq!(answer.states, vec![AgentState::Idle, AgentState::AnswerComposition, AgentState::Idle]);
    assert!(!answer.visited(AgentState::ToolExecution));
    assert!(answer.tool_calls.is_empty());
    assert_eq!(model.stages(), vec![Stage::AnswerComposition]);
}

#[tokio::test]
async fn chosen_tool_retrieves_then_composes() {
    let model = ScriptedModel::new(vec![
        Generation::call(ToolCall::new("Food_Dictionary")),
        Generation::answer("Aloo is potato."),
    ]);
    let agent = RoutingAgent::new(Arc::new(food_registry().await), model.clone(), AgentConfig::default()).unwrap();

    let answer = agent.answer("What is aloo?").await.expect("answer");
    assert_eq!(
        answer.states,
        vec![
            AgentState::Idle,
            AgentState::ToolSelection,
            AgentState::ToolExecution,
            AgentState::AnswerComposition,
            AgentState::Idle
        ]
    );
    assert_eq!(answer.tool_calls.len(), 1);
    let call = &answer.tool_calls[0];
    assert_eq!(call.tool, "Food_Dictionary");
    assert_eq!(call.collection, "dictionary");
    assert_eq!(call.results[0].chunk.text, "Aloo is a word for potato in South Asian cuisine.");

    let seen = model.seen.lock().clone();
    assert_eq!(seen[0].1, vec!["Food_Cookbook", "Food_Dictionary"], "tools listed in registration order");
    assert!(seen[1].1.is_empty(), "no tools offered during composition");
}

#[tokio::test]
async fn no_tool_chosen_uses_direct_answer() {
    let model = ScriptedModel::new(vec![Generation::answer("Hello! Ask me about food.")]);
    let agent = RoutingAgent::new(Arc::new(food_registry().await), model.clone(), AgentConfig::default()).unwrap();

    let answer = agent.answer("hi there").await.expect("answer");
    assert_eq!(answer.answer, "Hello! Ask me about food.");
    assert!(answer.visited(AgentState::ToolSelection));
    assert!(!answer.visited(AgentState::ToolExecution));
    assert_eq!(model.stages(), vec![Stage::ToolSelection], "selection answer is reused");
}

#[tokio::test]
async fn missing_collection_surfaces_as_tool_execution_error() {
    let mut registry = ToolRegistry::new();
    registry.register("Food_Almanac", "Seasonal produce.", "almanac", kitchen().await).unwrap();
    let model = ScriptedModel::new(vec![Generation::call(ToolCall::new("Food_Almanac"))]);
    let agent = RoutingAgent::new(Arc::new(registry), model, AgentConfig::default()).unwrap();

    let err = agent.answer("When are leeks in season?").await.unwrap_err();
    match err {
        Error::ToolExecution { tool, source } => {
            assert_eq!(tool, "Food_Almanac");
            assert!(matches!(*source, Error::CollectionNotFound(_)));
        }
        other => panic!("expected ToolExecution, got {other}"),
    }
}

#[tokio::test]
async fn embedding_failure_surfaces_as_tool_execution_error() {
    let registry = dictionary_over(Arc::new(Unreachable), RetrieverConfig::default());
    let model = ScriptedModel::new(vec![Generation::call(ToolCall::new("Food_Dictionary"))]);
    let agent = RoutingAgent::new(Arc::new(registry), model, AgentConfig::default()).unwrap();

    let err = agent.answer("What is aloo?").await.unwrap_err();
    match err {
        Error::ToolExecution { tool, source } => {
            assert_eq!(tool, "Food_Dictionary");
            assert!(matches!(*source, Error::EmbeddingUnavailable { .. }), "{source}");
        }
        other => panic!("expected ToolExecution, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn retrieval_timeout_passes_through_unwrapped() {
    let config = RetrieverConfig { top_k: 3, embed_timeout: Some(Duration::from_millis(200)) };
    let registry = dictionary_over(Arc::new(Hanging), config);
    let model = ScriptedModel::new(vec![Generation::call(ToolCall::new("Food_Dictionary"))]);
    let agent = RoutingAgent::new(Arc::new(registry), model, AgentConfig::default()).unwrap();

    let err = agent.answer("What is aloo?").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { ref operation, .. } if operation.contains("hanging")), "{err}");
}

#[tokio::test]
async fn unknown_tool_name_from_model_fails_the_turn() {
    let model = ScriptedModel::new(vec![Generation::call(ToolCall::new("Wine_List"))]);
    let agent = RoutingAgent::new(Arc::new(food_registry().await), model, AgentConfig::default()).unwrap();
    let err = agent.answer("Which wine goes with roast?").await.unwrap_err();
    assert!(matches!(err, Error::ToolExecution { ref source, .. } if matches!(**source, Error::UnknownTool(_))));
}

#[tokio::test]
async fn single_call_policy_keeps_first_tool_only() {
    let both = Generation {
        tool_calls: vec![ToolCall::new("Food_Dictionary"), ToolCall::new("Food_Cookbook")],
        answer: None,
    };
    let model = ScriptedModel::new(vec![both.clone(), Generation::answer("done")]);
    let agent = RoutingAgent::new(Arc::new(food_registry().await), model, AgentConfig::default()).unwrap();
    let answer = agent.answer("What is aloo and how do I boil it?").await.unwrap();
    let tools: Vec<&str> = answer.tool_calls.iter().map(|c| c.tool.as_str()).collect();
    assert_eq!(tools, vec!["Food_Dictionary"]);

    let model = ScriptedModel::new(vec![both, Generation::answer("done")]);
    let config = AgentConfig { allow_parallel_tool_calls: true, max_tool_calls: 2, ..AgentConfig::default() };
    let agent = RoutingAgent::new(Arc::new(food_registry().await), model, config).unwrap();
    let answer = agent.answer("What is aloo and how do I boil it?").await.unwrap();
    let tools: Vec<&str> = answer.tool_calls.iter().map(|c| c.tool.as_str()).collect();
    assert_eq!(tools, vec!["Food_Dictionary", "Food_Cookbook"]);
}

#[tokio::test]
async fn multi_hop_consults_dictionary_then_cookbook() {
    let model = ScriptedModel::new(vec![
        Generation::call(ToolCall::new("Food_Dictionary")),
        Generation::call(ToolCall::with_query("Food_Cookbook", "boil potatoes")),
        Generation::default(),
        Generation::answer("Aloo is potato; boil it in salted water."),
    ]);
    let config = AgentConfig { max_selection_rounds: 3, ..AgentConfig::default() };
    let agent = RoutingAgent::new(Arc::new(food_registry().await), model.clone(), config).unwrap();

    let answer = agent.answer("How do I cook aloo?").await.unwrap();
    let calls: Vec<(&str, &str)> = answer.tool_calls.iter().map(|c| (c.tool.as_str(), c.query.as_str())).collect();
    assert_eq!(calls, vec![("Food_Dictionary", "How do I cook aloo?"), ("Food_Cookbook", "boil potatoes")]);
    assert!(answer.tool_calls[1].results[0].chunk.text.starts_with("To boil potatoes"));
    assert_eq!(
        model.stages(),
        vec![Stage::ToolSelection, Stage::ToolSelection, Stage::ToolSelection, Stage::AnswerComposition]
    );
}

#[tokio::test]
async fn composition_without_answer_is_a_model_error() {
    let model = ScriptedModel::new(vec![Generation::default()]);
    let agent = RoutingAgent::new(Arc::new(ToolRegistry::new()), model, AgentConfig::default()).unwrap();
    assert!(matches!(agent.answer("What is aloo?").await, Err(Error::LanguageModel { .. })));
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let agent = RoutingAgent::new(Arc::new(ToolRegistry::new()), ScriptedModel::new(vec![]), AgentConfig::default()).unwrap();
    assert!(matches!(agent.answer("   ").await, Err(Error::InvalidArgument(_))));
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_times_out() {
    let config = AgentConfig { generate_timeout: Some(Duration::from_secs(5)), ..AgentConfig::default() };
    let agent = RoutingAgent::new(Arc::new(ToolRegistry::new()), Arc::new(Stalled), config).unwrap();
    let err = agent.answer("What is aloo?").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{err}");
}

#[tokio::test]
async fn extractive_model_routes_definitions_to_dictionary() {
    let agent = RoutingAgent::new(Arc::new(food_registry().await), Arc::new(ExtractiveModel::new()), AgentConfig::default()).unwrap();

    let answer = agent.answer("What is aloo?").await.expect("answer");
    assert_eq!(answer.tool_calls[0].tool, "Food_Dictionary");
    assert!(
        answer.answer.starts_with("According to Food_Dictionary (dictionary.txt): Aloo is a word for potato"),
        "{}",
        answer.answer
    );
}

#[tokio::test]
async fn extractive_model_routes_recipes_to_cookbook() {
    let agent = RoutingAgent::new(Arc::new(food_registry().await), Arc::new(ExtractiveModel::new()), AgentConfig::default()).unwrap();
    let answer = agent.answer("How do I boil potatoes?").await.expect("answer");
    assert_eq!(answer.tool_calls[0].tool, "Food_Cookbook");
    assert!(answer.answer.contains("To boil potatoes"), "{}", answer.answer);
}

#[tokio::test]
async fn extractive_model_without_tools_says_so() {
    let agent = RoutingAgent::new(Arc::new(ToolRegistry::new()), Arc::new(ExtractiveModel::new()), AgentConfig::default()).unwrap();
    let answer = agent.answer("What is aloo?").await.expect("answer");
    assert!(answer.answer.contains("no reference material"));
}

//! Retrieval tool surface for the external chat orchestrator.
//!
//! The chat/LLM loop is an external collaborator; what lives here is the
//! callable tool it consumes. Tools are registered in a [`ToolRegistry`]
//! and exposed via `GET /tools/list` for discovery and `POST /tools/{name}`
//! for invocation.
//!
//! One retrieval tool, `get_information`, is registered per deployment. Its
//! output shape follows the configured pipeline — `{guides, sources}` for
//! the text pipeline, `[{text, similarity, imageUrls}]` for multimodal —
//! and the two shapes are never mixed.
//!
//! [`ToolTurn`] is the helper an orchestrator drives for one chat turn: it
//! enforces the step budget that bounds how many tool invocations a single
//! turn may perform.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use guidebase_core::embedding::{MultimodalEmbedder, TextEmbedder};
use guidebase_core::retrieve::{retrieve_guides, retrieve_multimodal, RetrievalPolicy};
use guidebase_core::store::Store;

/// Default per-turn bound on retrieval-tool invocations.
pub const DEFAULT_MAX_STEPS: usize = 5;

/// A callable tool that agents can discover and invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, used as the route path (`POST /tools/{name}`).
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with JSON parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Bridge to the knowledge base for tool execution.
///
/// Holds the injected store and embedding clients — constructed once at
/// process start — plus the retrieval policy constants.
pub struct ToolContext {
    pub store: Arc<dyn Store>,
    pub text_embedder: Arc<dyn TextEmbedder>,
    pub multimodal_embedder: Arc<dyn MultimodalEmbedder>,
    pub policy: RetrievalPolicy,
}

impl ToolContext {
    pub fn new(
        store: Arc<dyn Store>,
        text_embedder: Arc<dyn TextEmbedder>,
        multimodal_embedder: Arc<dyn MultimodalEmbedder>,
        policy: RetrievalPolicy,
    ) -> Self {
        Self {
            store,
            text_embedder,
            multimodal_embedder,
            policy,
        }
    }
}

fn question_param(params: &Value) -> Result<&str> {
    let question = params["question"].as_str().unwrap_or("");
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    Ok(question)
}

fn question_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "question": { "type": "string", "description": "the user's question" }
        },
        "required": ["question"]
    })
}

/// Text-pipeline retrieval tool: returns `{guides, sources}`.
pub struct GetInformationTool;

#[async_trait]
impl Tool for GetInformationTool {
    fn name(&self) -> &str {
        "get_information"
    }

    fn description(&self) -> &str {
        "Get information from the knowledge base to answer questions"
    }

    fn parameters_schema(&self) -> Value {
        question_schema()
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let question = question_param(&params)?;
        let query_vec = ctx.text_embedder.embed_query(question).await?;
        let result = retrieve_guides(ctx.store.as_ref(), &query_vec, &ctx.policy).await?;
        Ok(serde_json::to_value(result)?)
    }
}

/// Multimodal retrieval tool: returns `[{text, similarity, imageUrls}]`.
pub struct GetInformationMultimodalTool;

#[async_trait]
impl Tool for GetInformationMultimodalTool {
    fn name(&self) -> &str {
        "get_information"
    }

    fn description(&self) -> &str {
        "Get information (text and images) from the knowledge base to answer questions"
    }

    fn parameters_schema(&self) -> Value {
        question_schema()
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let question = question_param(&params)?;
        let query_vec = ctx.multimodal_embedder.embed_query(question).await?;
        let guides = retrieve_multimodal(ctx.store.as_ref(), &query_vec, &ctx.policy).await?;
        Ok(serde_json::to_value(guides)?)
    }
}

/// Registry for the tools a deployment serves.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the retrieval tool for the given pipeline
    /// (`"multimodal"` or the default text pipeline).
    pub fn for_pipeline(pipeline: &str) -> Self {
        let mut registry = Self::new();
        if pipeline == "multimodal" {
            registry.register(Box::new(GetInformationMultimodalTool));
        } else {
            registry.register(Box::new(GetInformationTool));
        }
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-turn bound on tool invocations.
pub struct StepBudget {
    max: usize,
    used: AtomicUsize,
}

impl StepBudget {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            used: AtomicUsize::new(0),
        }
    }

    /// Claim one step; `false` when the budget is exhausted.
    pub fn try_claim(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }
}

/// One chat turn's view of the tool registry.
///
/// The orchestrator creates a fresh turn per user message and routes every
/// tool invocation through [`call`](ToolTurn::call); once the step budget
/// is spent, further calls fail without touching the retriever.
pub struct ToolTurn {
    registry: Arc<ToolRegistry>,
    ctx: Arc<ToolContext>,
    budget: StepBudget,
}

impl ToolTurn {
    pub fn new(registry: Arc<ToolRegistry>, ctx: Arc<ToolContext>, max_steps: usize) -> Self {
        Self {
            registry,
            ctx,
            budget: StepBudget::new(max_steps),
        }
    }

    pub async fn call(&self, name: &str, params: Value) -> Result<Value> {
        if !self.budget.try_claim() {
            anyhow::bail!("tool step budget exhausted for this turn");
        }
        let tool = self
            .registry
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {name}"))?;
        tool.execute(params, &self.ctx).await
    }

    pub fn steps_used(&self) -> usize {
        self.budget.used()
    }
}

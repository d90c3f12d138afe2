use crate::models::{CatalogModel, PromptKind, PromptSnippet};

use super::BoxFuture;
use super::error::RepositoryResult;

/// Models seeded into an empty catalog, in display order
pub const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("anthropic/claude-sonnet-4", "Claude Sonnet 4"),
    ("anthropic/claude-3.5-haiku", "Claude 3.5 Haiku"),
    ("openai/gpt-4o", "GPT-4o"),
    ("openai/gpt-4o-mini", "GPT-4o Mini"),
    ("google/gemini-2.0-flash-001", "Gemini 2.0 Flash"),
    ("meta-llama/llama-3.3-70b-instruct", "Llama 3.3 70B"),
];

#[derive(Debug, Clone, Default)]
pub struct ModelUpdate {
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub name: String,
    pub kind: PromptKind,
    pub content: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptUpdate {
    pub name: Option<String>,
    pub kind: Option<PromptKind>,
    pub content: Option<String>,
    /// `Some(None)` clears the category
    pub category: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    pub kind: Option<PromptKind>,
    pub category: Option<String>,
}

impl PromptFilter {
    pub fn matches(&self, prompt: &PromptSnippet) -> bool {
        self.kind.is_none_or(|kind| prompt.kind == kind)
            && self
                .category
                .as_ref()
                .is_none_or(|category| prompt.category.as_ref() == Some(category))
    }
}

/// Repository trait for the model catalog and saved prompts
pub trait CatalogRepository: Send + Sync + 'static {
    /// Catalog models ordered by `(sort_order, id)`. Inactive entries are
    /// skipped unless `include_inactive` is set.
    fn list_models(
        &self,
        include_inactive: bool,
    ) -> BoxFuture<'static, RepositoryResult<Vec<CatalogModel>>>;

    /// Append a model after the current last entry (`max(sort_order) + 1`)
    fn add_model(
        &self,
        model_id: &str,
        display_name: &str,
    ) -> BoxFuture<'static, RepositoryResult<CatalogModel>>;

    fn update_model(
        &self,
        id: i64,
        update: ModelUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<CatalogModel>>>;

    fn delete_model(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>>;

    /// Apply `(id, sort_order)` pairs all-or-nothing. An unknown id fails the
    /// whole batch.
    fn reorder_models(&self, orders: Vec<(i64, i64)>) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Saved prompts, most recently updated first
    fn list_prompts(
        &self,
        filter: PromptFilter,
    ) -> BoxFuture<'static, RepositoryResult<Vec<PromptSnippet>>>;

    fn create_prompt(&self, prompt: NewPrompt) -> BoxFuture<'static, RepositoryResult<PromptSnippet>>;

    fn update_prompt(
        &self,
        id: i64,
        update: PromptUpdate,
    ) -> BoxFuture<'static, RepositoryResult<Option<PromptSnippet>>>;

    fn delete_prompt(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>>;
}

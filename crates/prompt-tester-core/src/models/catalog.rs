use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A model the user has added to their selectable catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub id: i64,
    /// Provider-qualified identifier, e.g. `openai/gpt-4o`
    pub model_id: String,
    pub display_name: String,
    pub is_active: bool,
    /// Rendering order key; not necessarily contiguous
    pub sort_order: i64,
}

impl CatalogModel {
    /// Display name for a model id, falling back to the raw id when the
    /// catalog does not know it.
    pub fn display_name_for<'a>(catalog: &'a [CatalogModel], model_id: &'a str) -> &'a str {
        catalog
            .iter()
            .find(|m| m.model_id == model_id)
            .map(|m| m.display_name.as_str())
            .unwrap_or(model_id)
    }
}

/// Sort catalog entries by `(sort_order, id)`.
pub fn sort_catalog(models: &mut [CatalogModel]) {
    models.sort_by_key(|m| (m.sort_order, m.id));
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    System,
    User,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::System => "system",
            PromptKind::User => "user",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(PromptKind::System),
            "user" => Ok(PromptKind::User),
            other => Err(format!("prompt kind must be 'system' or 'user', got '{}'", other)),
        }
    }
}

/// A saved prompt used to prefill the system or user prompt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptSnippet {
    pub id: i64,
    pub name: String,
    pub kind: PromptKind,
    pub content: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

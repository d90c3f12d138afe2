use serde::{Deserialize, Serialize};

use crate::models::SessionMode;

use super::error::DispatchError;

/// Which models a submission fans out to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModelSelection {
    /// One model called `repeat` times
    SingleRepeat { model_id: String, repeat: u32 },
    /// Each model called once; duplicates give independent threads
    MultiModel { model_ids: Vec<String> },
}

/// Split a comma-separated model list, trimming and dropping empty items
pub fn parse_model_list(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

impl ModelSelection {
    pub fn single(model_id: impl Into<String>, repeat: u32) -> Self {
        ModelSelection::SingleRepeat {
            model_id: model_id.into(),
            repeat,
        }
    }

    /// Checked catalog models followed by ad-hoc comma-separated ids
    pub fn multi(checked: impl IntoIterator<Item = String>, adhoc_csv: &str) -> Self {
        let mut model_ids: Vec<String> = checked
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        model_ids.extend(parse_model_list(adhoc_csv));
        ModelSelection::MultiModel { model_ids }
    }

    pub fn mode(&self) -> SessionMode {
        match self {
            ModelSelection::SingleRepeat { .. } => SessionMode::SingleRepeat,
            ModelSelection::MultiModel { .. } => SessionMode::MultiModel,
        }
    }

    pub fn validate(&self, max_repeat: u32) -> Result<(), DispatchError> {
        match self {
            ModelSelection::SingleRepeat { model_id, repeat } => {
                if model_id.trim().is_empty() {
                    return Err(DispatchError::NoModelSelected);
                }
                if *repeat < 1 || *repeat > max_repeat {
                    return Err(DispatchError::InvalidRepeatCount {
                        got: *repeat,
                        max: max_repeat,
                    });
                }
                Ok(())
            }
            ModelSelection::MultiModel { model_ids } => {
                if model_ids.is_empty() || model_ids.iter().any(|m| m.trim().is_empty()) {
                    return Err(DispatchError::NoModelSelected);
                }
                Ok(())
            }
        }
    }

    /// One `(model_id, iteration)` entry per thread to create
    pub fn expand(&self) -> Vec<(String, Option<u32>)> {
        match self {
            ModelSelection::SingleRepeat { model_id, repeat } => (1..=*repeat)
                .map(|i| (model_id.trim().to_string(), Some(i)))
                .collect(),
            ModelSelection::MultiModel { model_ids } => {
                model_ids.iter().map(|m| (m.clone(), None)).collect()
            }
        }
    }
}

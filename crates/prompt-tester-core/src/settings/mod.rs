pub mod json_repository;
pub mod model;

pub use json_repository::{SettingsJsonRepository, SettingsRepository};
pub use model::Settings;

//! Core of the prompt tester: send one prompt to many models, stream their
//! replies side by side and keep every conversation in SQLite.

pub mod chat;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;

pub use chat::{ChatEngine, ChatStore, DispatchError, ModelSelection, Submission};
pub use settings::Settings;

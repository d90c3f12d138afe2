pub mod dispatch;
pub mod error;
pub mod events;
pub mod persistence;
pub mod rehydrate;
pub mod selection;
pub mod store;

pub use dispatch::{ChatEngine, EngineConfig, EngineServices, SubmitReport, Submission, TurnOutcome};
pub use error::DispatchError;
pub use events::ChatEvent;
pub use persistence::PersistenceWriter;
pub use rehydrate::{RehydratedSession, rehydrate};
pub use selection::{ModelSelection, parse_model_list};
pub use store::{ChatAction, ChatState, ChatStore, reduce};

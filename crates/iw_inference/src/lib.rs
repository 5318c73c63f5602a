pub mod classifier;
pub mod gate;
pub mod models;

pub use classifier::Categorizer;
pub use gate::ContentGate;
pub use models::create_model;

pub mod prelude {
    pub use super::classifier::Categorizer;
    pub use super::gate::ContentGate;
    pub use super::models::{create_model, DummyModel, OpenAiModel};
    pub use iw_core::{Category, CompletionModel, Error, Result};
}

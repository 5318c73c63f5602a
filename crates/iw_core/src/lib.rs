pub mod config;
pub mod error;
pub mod models;
pub mod shutdown;
pub mod storage;
pub mod types;

pub use error::Error;
pub use models::{CompletionModel, CompletionRequest};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use storage::ArticleStorage;
pub use types::{Article, Category, RawArticle, Severity, StoredArticle, TimeWindow};

pub type Result<T> = std::result::Result<T, Error>;

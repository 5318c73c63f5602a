pub mod dedup;
pub mod fetcher;
pub mod run_loop;
pub mod sources;

#[cfg(test)]
mod test_utils;

pub use dedup::{deduplicate, Deduplicate};
pub use fetcher::{FetchSummary, Fetcher};
pub use iw_core::shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use run_loop::{LoopReport, LoopState, RunLoop};
pub use sources::{ArticleSource, NewsDataSource, SourcePage};

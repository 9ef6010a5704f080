pub mod config;
pub mod data;
pub mod error;
pub mod load;
pub mod rank;
pub mod report;
pub mod sanitize;
pub mod store;

pub use config::LoaderConfig;
pub use data::Database;
pub use error::LoadError;
pub use load::{LoadOutcome, Loader, load_local_files, record_session};
pub use rank::{RankOptions, RankedPage, ReferenceGraph, candidate_limit, rank_candidates};
pub use sanitize::{HttpLinkChecker, LinkChecker, Sanitizer};
pub use store::PageSet;

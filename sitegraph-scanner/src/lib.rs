pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod result;

pub use crawler::{Crawler, DEFAULT_EXCLUDED_EXTENSIONS, ProgressCallback};
pub use error::ScanError;
pub use fetch::{BrowserRenderer, ContentFetcher, HttpRenderer, Renderer, load_local_file};
pub use result::{Page, PageMetadata, PageTarget, SourceType};

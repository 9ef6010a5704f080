// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    initialize_workspace, load_config, load_urls_from_file, parse_replacement, parse_url_line,
};

// Re-export pipeline functionality from sitegraph-core
pub use sitegraph_core::load::{Loader, extract_url_path, generate_crawl_summary};

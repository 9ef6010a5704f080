use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitegraph_scanner::Page;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// The on-disk result of a crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSet {
    pub seed_url: String,
    pub created_at: DateTime<Utc>,
    pub pages: Vec<Page>,
}

impl PageSet {
    pub fn new(seed_url: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            seed_url: seed_url.into(),
            created_at: Utc::now(),
            pages,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn error_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_error).count()
    }
}

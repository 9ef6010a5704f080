use serde::{Deserialize, Serialize};

/// Where a page's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Web,
    Local,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Web => "web",
            SourceType::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub source: String,
}

/// A fetched page. `content` is `None` when the fetch failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub url: String,
    pub content: Option<String>,
    pub metadata: PageMetadata,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
}

impl Page {
    pub fn new(id: impl Into<String>, url: impl Into<String>, title: String, content: String) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            metadata: PageMetadata {
                title,
                source: url.clone(),
            },
            url,
            content: Some(content),
            is_error: false,
            error_message: None,
            source_type: SourceType::Web,
        }
    }

    pub fn with_error(id: impl Into<String>, url: impl Into<String>, error: String) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            metadata: PageMetadata {
                title: url.clone(),
                source: url.clone(),
            },
            url,
            content: None,
            is_error: true,
            error_message: Some(error),
            source_type: SourceType::Web,
        }
    }

    pub fn local(mut self) -> Self {
        self.source_type = SourceType::Local;
        self
    }
}

/// A URL scheduled for content fetching, paired with its page id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    pub id: String,
    pub url: String,
}

impl PageTarget {
    /// Numbers the URLs in order, as the crawl output is numbered.
    pub fn enumerate(urls: &[String]) -> Vec<PageTarget> {
        urls.iter()
            .enumerate()
            .map(|(idx, url)| PageTarget {
                id: idx.to_string(),
                url: url.clone(),
            })
            .collect()
    }
}

//! Structured description of a content source.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of thing a source reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Repository,
    WebPage,
    Document,
}

impl ContentKind {
    /// Classify a source reference.
    ///
    /// GitHub repository pages are repositories (API and `/repos/` paths are
    /// not), other http(s) URLs are web pages and everything else is treated
    /// as a local document.
    pub fn detect(source_reference: &str) -> Self {
        let Ok(url) = Url::parse(source_reference.trim()) else {
            return ContentKind::Document;
        };

        match url.scheme() {
            "http" | "https" => {
                let host = url.host_str().unwrap_or_default();
                let is_github = host == "github.com" || host == "www.github.com";
                if is_github && !url.path().starts_with("/repos/") {
                    ContentKind::Repository
                } else {
                    ContentKind::WebPage
                }
            }
            _ => ContentKind::Document,
        }
    }
}

/// Output of content analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentDescriptor {
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Leading excerpt of the raw content
    #[serde(default)]
    pub raw_excerpt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(
            ContentKind::detect("https://github.com/tokio-rs/tokio"),
            ContentKind::Repository
        );
        assert_eq!(
            ContentKind::detect("https://api.github.com/repos/tokio-rs/tokio"),
            ContentKind::WebPage
        );
        assert_eq!(
            ContentKind::detect("https://docs.rs/tokio"),
            ContentKind::WebPage
        );
        assert_eq!(
            ContentKind::detect("uploads/spec.pdf"),
            ContentKind::Document
        );
        assert_eq!(
            ContentKind::detect("file:///tmp/notes.md"),
            ContentKind::Document
        );
    }
}

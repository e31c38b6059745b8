use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Document model - one paper, feed item, web page or dataset row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source: SourceKind,
    /// Unique within `source`: arXiv id, feed entry id, or URL
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(source: SourceKind, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
            title: title.into(),
            link: String::new(),
            summary: None,
            content: None,
            authors: Vec::new(),
            categories: Vec::new(),
            published_at: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Globally unique key, `source:id`
    pub fn doc_id(&self) -> String {
        format!("{}:{}", self.source, self.id)
    }

    /// Everything worth matching a query against
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![self.title.as_str()];
        if let Some(summary) = &self.summary {
            parts.push(summary);
        }
        if let Some(content) = &self.content {
            parts.push(content);
        }
        for category in &self.categories {
            parts.push(category);
        }
        parts.join(" ")
    }
}

/// Where a document came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Arxiv,
    Feed,
    Web,
    Dataset,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Arxiv => write!(f, "arxiv"),
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::Web => write!(f, "web"),
            SourceKind::Dataset => write!(f, "dataset"),
        }
    }
}

/// A document with the score some ranking step assigned it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
    /// Best label when the score came from a classifier
    pub label: Option<String>,
}

impl ScoredDocument {
    /// Non-finite scores are stored as 0.0
    pub fn new(document: Document, score: f32) -> Self {
        Self {
            document,
            score: if score.is_finite() { score } else { 0.0 },
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// How a query is matched against documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    #[default]
    Keyword,
    Semantic,
    Hybrid,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" | "bm25" => Ok(SearchMode::Keyword),
            "semantic" | "embedding" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

/// Keep the first occurrence of each `doc_id()`, preserving order
pub fn dedup_documents(docs: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    docs.into_iter().filter(|d| seen.insert(d.doc_id())).collect()
}

/// Highest score first; equal scores keep their input order
pub fn sort_by_score_desc(results: &mut [ScoredDocument]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

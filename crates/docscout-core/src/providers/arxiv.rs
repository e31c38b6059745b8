// arXiv provider - bridges ArxivClient with the DocumentProvider trait
use async_trait::async_trait;
use docscout_api::{ArxivClient, ArxivEntry, ArxivQuery, ArxivSort, HttpSettings};

use crate::{
    models::{Document, SourceKind},
    search::DocumentProvider,
    Result,
};

/// Wrapper around ArxivClient that implements DocumentProvider
pub struct ArxivProvider {
    client: ArxivClient,
    sort: ArxivSort,
}

impl ArxivProvider {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        Ok(Self::from_client(ArxivClient::new(settings)?))
    }

    pub fn from_client(client: ArxivClient) -> Self {
        Self {
            client,
            sort: ArxivSort::Relevance,
        }
    }

    pub fn with_sort(mut self, sort: ArxivSort) -> Self {
        self.sort = sort;
        self
    }
}

#[async_trait]
impl DocumentProvider for ArxivProvider {
    fn name(&self) -> String {
        "arxiv".to_string()
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let request = ArxivQuery::new(query).max_results(limit).sort(self.sort);
        let entries = self.client.search(&request).await?;
        Ok(entries.into_iter().map(arxiv_to_document).collect())
    }
}

/// Convert an arXiv entry to our internal Document model
pub fn arxiv_to_document(entry: ArxivEntry) -> Document {
    Document {
        source: SourceKind::Arxiv,
        id: entry.arxiv_id,
        title: entry.title,
        link: entry.abs_url,
        summary: Some(entry.summary).filter(|s| !s.is_empty()),
        content: None,
        authors: entry.authors,
        categories: entry.categories,
        published_at: entry.published.or(entry.updated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arxiv_to_document() {
        let entry = ArxivEntry {
            arxiv_id: "1810.04805v2".into(),
            title: "BERT".into(),
            summary: "We introduce a new language representation model".into(),
            authors: vec!["Jacob Devlin".into()],
            categories: vec!["cs.CL".into()],
            abs_url: "http://arxiv.org/abs/1810.04805v2".into(),
            pdf_url: None,
            published: None,
            updated: None,
        };

        let doc = arxiv_to_document(entry);
        assert_eq!(doc.source, SourceKind::Arxiv);
        assert_eq!(doc.doc_id(), "arxiv:1810.04805v2");
        assert_eq!(doc.categories, vec!["cs.CL"]);
        assert!(doc.summary.is_some());
    }

    #[test]
    fn test_empty_summary_is_none() {
        let entry = ArxivEntry {
            arxiv_id: "x".into(),
            title: "t".into(),
            summary: String::new(),
            authors: vec![],
            categories: vec![],
            abs_url: String::new(),
            pdf_url: None,
            published: None,
            updated: None,
        };
        assert!(arxiv_to_document(entry).summary.is_none());
    }
}

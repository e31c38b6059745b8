use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::http::{build_client, check_status, HttpSettings};
use crate::retry::{with_retry_if, RetryConfig};

/// Main text of a web page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Fetches article pages and pulls out their readable content
pub struct PageClient {
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl PageClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: build_client(settings)?,
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Download a page and extract its article text
    pub async fn extract(&self, url: &str) -> Result<ExtractedPage> {
        let parsed = url::Url::parse(url)?;

        let html = with_retry_if(
            &self.retry_config,
            || async {
                let response = self.client.get(url).send().await?;
                let response = check_status(response, url).await?;
                Ok::<_, ApiError>(response.text().await?)
            },
            ApiError::is_retryable,
        )
        .await?;

        let page = extract_from_html(&html, &parsed);
        info!("Extracted {} chars of text from {}", page.text.len(), url);
        Ok(page)
    }
}

/// Run readability over an HTML document, falling back to paragraph text
pub fn extract_from_html(html: &str, url: &url::Url) -> ExtractedPage {
    let mut reader = Cursor::new(html.as_bytes());

    match readability::extractor::extract(&mut reader, url) {
        Ok(product) => {
            let text = match html2text::from_read(product.content.as_bytes(), 100) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to convert extracted HTML to text: {}", e);
                    product.text
                }
            };
            let text = tidy_lines(&text);

            if text.is_empty() {
                return fallback_extract(html, url);
            }

            ExtractedPage {
                url: url.to_string(),
                title: product.title.trim().to_string(),
                text,
            }
        }
        Err(e) => {
            warn!("Readability failed for {}: {}", url, e);
            fallback_extract(html, url)
        }
    }
}

/// `<title>` plus every `<p>` in document order
fn fallback_extract(html: &str, url: &url::Url) -> ExtractedPage {
    let document = scraper::Html::parse_document(html);

    let title = scraper::Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let text = match scraper::Selector::parse("p") {
        Ok(sel) => document
            .select(&sel)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Err(_) => String::new(),
    };

    ExtractedPage {
        url: url.to_string(),
        title,
        text,
    }
}

/// Trim each line and squeeze runs of blank lines
fn tidy_lines(text: &str) -> String {
    let mut out = Vec::new();
    let mut blank = false;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank && !out.is_empty() {
                out.push(String::new());
            }
            blank = true;
        } else {
            out.push(line.to_string());
            blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Truncate to at most `limit` characters without splitting a char
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 2), "");
    }

    #[test]
    fn test_fallback_extract() {
        let html = "<html><head><title> A page </title></head><body>\
                    <p>First   paragraph.</p><div>nav</div><p>Second one.</p><p> </p></body></html>";
        let url = url::Url::parse("https://example.com/a").unwrap();
        let page = fallback_extract(html, &url);
        assert_eq!(page.title, "A page");
        assert_eq!(page.text, "First paragraph.\n\nSecond one.");
    }

    #[test]
    fn test_tidy_lines() {
        assert_eq!(tidy_lines("a  \n\n\n b\n\n"), "a\n\n b");
    }
}

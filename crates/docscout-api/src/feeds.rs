use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::http::{build_client, check_status, HttpSettings};
use crate::retry::{with_retry_if, RetryConfig};

/// A parsed RSS/Atom/JSON feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedFeed {
    pub url: String,
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// One item of a feed with HTML already stripped from the text fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

pub struct FeedClient {
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl FeedClient {
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

    /// Fetch and parse a feed
    ///
    /// Client errors (4xx) fail immediately; server errors, rate limiting
    /// and network errors are retried with backoff.
    pub async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        url::Url::parse(url)?;

        let body = with_retry_if(
            &self.retry_config,
            || async {
                let response = self.client.get(url).send().await?;
                let response = check_status(response, url).await?;
                Ok::<_, ApiError>(response.bytes().await?)
            },
            ApiError::is_retryable,
        )
        .await?;

        let feed = parse_feed(url, &body)?;
        info!("Fetched {} entries from {}", feed.entries.len(), url);
        Ok(feed)
    }
}

/// Parse a feed body
pub fn parse_feed(url: &str, body: &[u8]) -> Result<FetchedFeed> {
    let feed = feed_rs::parser::parse(body).map_err(|e| ApiError::ParseError(e.to_string()))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_else(|| entry.id.clone());

        let title = entry
            .title
            .map(|t| html_to_text(&t.content))
            .unwrap_or_default();

        if title.is_empty() && link.is_empty() {
            debug!("Skipping feed entry without title or link: {}", entry.id);
            continue;
        }

        entries.push(FeedEntry {
            id: if entry.id.is_empty() {
                link.clone()
            } else {
                entry.id
            },
            title,
            link,
            summary: entry
                .summary
                .map(|t| html_to_text(&t.content))
                .filter(|s| !s.is_empty()),
            content: entry
                .content
                .and_then(|c| c.body)
                .map(|b| html_to_text(&b))
                .filter(|s| !s.is_empty()),
            authors: entry.authors.into_iter().map(|p| p.name).collect(),
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
            published: entry.published.or(entry.updated),
        });
    }

    Ok(FetchedFeed {
        url: url.to_string(),
        title: feed.title.map(|t| html_to_text(&t.content)),
        entries,
    })
}

/// Strip markup from a feed text field and collapse whitespace
pub fn html_to_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    let text = html2text::from_read(html.as_bytes(), 10_000)
        .unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <link>https://news.example.com/</link>
    <description>Test feed</description>
    <item>
      <title>Central bank raises rates</title>
      <link>https://news.example.com/rates</link>
      <guid>rates-1</guid>
      <description>&lt;p&gt;The central bank &lt;b&gt;raised&lt;/b&gt; interest rates.&lt;/p&gt;</description>
      <category>economy</category>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Local team wins final</title>
      <link>https://news.example.com/final</link>
      <guid>final-1</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss() {
        let feed = parse_feed("https://news.example.com/rss", RSS.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example News"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.id, "rates-1");
        assert_eq!(first.title, "Central bank raises rates");
        assert_eq!(first.link, "https://news.example.com/rates");
        let summary = first.summary.as_deref().unwrap();
        assert!(summary.contains("raised"));
        assert!(!summary.contains("<b>"));
        assert_eq!(first.categories, vec!["economy"]);
        assert!(first.published.is_some());

        assert!(feed.entries[1].summary.is_none());
    }

    #[test]
    fn test_parse_garbage_fails() {
        let result = parse_feed("https://x.test", b"definitely not a feed");
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_html_to_text_plain_passthrough() {
        assert_eq!(html_to_text("  plain\n text  "), "plain text");
    }
}

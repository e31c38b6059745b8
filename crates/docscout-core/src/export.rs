use crate::{models::ScoredDocument, Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl ExportFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            "md" | "markdown" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
        }
    }
}

/// Exporter for ranked results
pub struct Exporter;

impl Exporter {
    /// Export results to a file, picking the format from the extension
    pub fn export_to_file<P: AsRef<Path>>(results: &[ScoredDocument], path: P) -> Result<()> {
        let path = path.as_ref();

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ExportFormat::from_extension)
            .ok_or_else(|| {
                Error::ConfigError(
                    "Could not determine export format from extension. Use .json, .csv, or .md"
                        .to_string(),
                )
            })?;

        Self::export_to_file_with_format(results, path, format)
    }

    pub fn export_to_file_with_format<P: AsRef<Path>>(
        results: &[ScoredDocument],
        path: P,
        format: ExportFormat,
    ) -> Result<()> {
        let content = match format {
            ExportFormat::Json => Self::to_json(results)?,
            ExportFormat::Csv => Self::to_csv(results),
            ExportFormat::Markdown => Self::to_markdown(results),
        };

        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;

        Ok(())
    }

    pub fn to_json(results: &[ScoredDocument]) -> Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    pub fn to_csv(results: &[ScoredDocument]) -> String {
        let mut output = String::from("Rank,Score,Label,Source,Id,Title,Published,Link\n");

        for (i, result) in results.iter().enumerate() {
            let doc = &result.document;
            output.push_str(&format!(
                "{},{:.4},{},{},{},{},{},{}\n",
                i + 1,
                result.score,
                Self::escape_csv(result.label.as_deref().unwrap_or("")),
                doc.source,
                Self::escape_csv(&doc.id),
                Self::escape_csv(&doc.title),
                doc.published_at
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                Self::escape_csv(&doc.link),
            ));
        }

        output
    }

    pub fn to_markdown(results: &[ScoredDocument]) -> String {
        let mut output = String::new();

        output.push_str("# Search Results\n\n");
        output.push_str(&format!("Total documents: {}\n\n", results.len()));
        output.push_str("---\n\n");

        for (i, result) in results.iter().enumerate() {
            let doc = &result.document;
            if doc.link.is_empty() {
                output.push_str(&format!("## {}. {}\n\n", i + 1, doc.title));
            } else {
                output.push_str(&format!("## {}. [{}]({})\n\n", i + 1, doc.title, doc.link));
            }

            output.push_str(&format!("**Score:** {:.4} | **Source:** {}", result.score, doc.source));
            if let Some(label) = &result.label {
                output.push_str(&format!(" | **Label:** {}", label));
            }
            if let Some(published) = doc.published_at {
                output.push_str(&format!(" | **Published:** {}", published.format("%Y-%m-%d")));
            }
            output.push_str("\n\n");

            if !doc.authors.is_empty() {
                output.push_str(&format!("*{}*\n\n", doc.authors.join(", ")));
            }

            if let Some(summary) = &doc.summary {
                output.push_str(&format!("{}\n\n", summary));
            }

            if !doc.categories.is_empty() {
                let tags: Vec<_> = doc.categories.iter().map(|c| format!("`{}`", c)).collect();
                output.push_str(&format!("**Categories:** {}\n", tags.join(", ")));
            }

            output.push_str("\n---\n\n");
        }

        output
    }

    /// Escape CSV special characters
    fn escape_csv(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

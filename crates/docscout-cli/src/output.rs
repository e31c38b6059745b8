use anyhow::Context;
use docscout_core::{Exporter, ScoredDocument};
use docscout_nli::{Classification, EvaluationReport, SummaryOutcome};
use std::path::Path;

/// One line per result: `rank. score  title  link`
pub fn format_results(results: &[ScoredDocument]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {:.4}  {}  {}",
            i + 1,
            result.score,
            result.document.title,
            result.document.link
        ));
        if let Some(label) = &result.label {
            out.push_str(&format!("  [{}]", label));
        }
        out.push('\n');
    }
    out
}

pub fn print_results(results: &[ScoredDocument]) {
    if results.is_empty() {
        println!("No matching documents.");
        return;
    }
    print!("{}", format_results(results));
}

pub fn print_classification(classification: &Classification) {
    for (label, score) in classification.labels.iter().zip(&classification.scores) {
        println!("{:<20} {:.4}", label, score);
    }
}

pub fn print_summary(title: &str, outcome: &SummaryOutcome) {
    if !title.is_empty() {
        println!("{}", title);
    }
    if outcome.fell_back {
        println!("(extractive summary, model unavailable)");
    }
    println!("{}", outcome.text);
}

pub fn print_report(report: &EvaluationReport) {
    print!("{}", report);
}

pub fn export(results: &[ScoredDocument], path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        Exporter::export_to_file(results, path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        eprintln!("Exported {} results to {}", results.len(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscout_core::{Document, SourceKind};

    #[test]
    fn test_format_results() {
        let results = vec![
            ScoredDocument::new(
                Document::new(SourceKind::Arxiv, "1", "Attention Is All You Need")
                    .with_link("http://arxiv.org/abs/1706.03762"),
                0.91234,
            ),
            ScoredDocument::new(Document::new(SourceKind::Feed, "2", "Cup final"), 0.5)
                .with_label("sports"),
        ];

        let out = format_results(&results);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "1. 0.9123  Attention Is All You Need  http://arxiv.org/abs/1706.03762"
        );
        assert!(lines[1].starts_with("2. 0.5000  Cup final"));
        assert!(lines[1].ends_with("[sports]"));
    }
}

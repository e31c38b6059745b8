// Command handlers: build clients from config, run a pipeline, print
use crate::output;
use anyhow::{bail, Context};
use docscout_api::{
    ArxivClient, DatasetClient, HttpSettings, InferenceClient, PageClient, RowsRequest,
    SummaryParams,
};
use docscout_cache::DocumentCache;
use docscout_core::{
    ArxivProvider, CachedSearchEngine, Config, Document, DocumentProvider, FeedProvider,
    ScoredDocument, SearchEngine, SearchMode,
};
use docscout_nli::{
    evaluate, examples_from_rows, summarize_with_fallback, ExtractiveSummarizer, NewsRanker,
    RankTarget, RemoteNliModel, RemoteSummarizer, Summarizer, SummaryOutcome, ZeroShotClassifier,
};
use docscout_semantic::{
    rank_by_similarity, BM25Scorer, Bm25Params, EmbeddingGenerator, SemanticSearchEngine,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    Arxiv,
    Feed,
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Where candidate documents come from
    #[arg(long, value_enum, default_value = "arxiv")]
    pub source: Source,

    /// Feed URL (repeatable); defaults to the feeds in the config file
    #[arg(long = "feed")]
    pub feeds: Vec<String>,

    /// keyword, semantic or hybrid
    #[arg(long, default_value = "keyword")]
    pub mode: SearchMode,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Write results to FILE (.json, .csv or .md)
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Skip the document cache and the saved vector index
    #[arg(long)]
    pub no_cache: bool,

    /// Only read from the cache
    #[arg(long, conflicts_with = "no_cache")]
    pub offline: bool,
}

impl SearchArgs {
    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(self.no_cache, self.offline, false)
    }
}

#[derive(Debug, clap::Args)]
pub struct RankArgs {
    /// Feed URL (repeatable)
    #[arg(long = "feed", required = true)]
    pub feeds: Vec<String>,

    /// Label to rank articles by
    #[arg(long, required_unless_present = "hypothesis")]
    pub label: Option<String>,

    /// Other candidate labels, comma separated
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Score each label independently
    #[arg(long)]
    pub multi_label: bool,

    /// Rank by entailment of this sentence instead of a label
    #[arg(long, conflicts_with = "label")]
    pub hypothesis: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Skip the document cache entirely
    #[arg(long)]
    pub no_cache: bool,
}

impl RankArgs {
    fn target(&self) -> RankTarget {
        match (&self.hypothesis, &self.label) {
            (Some(hypothesis), _) => RankTarget::Hypothesis(hypothesis.clone()),
            (None, label) => RankTarget::label(
                label.clone().unwrap_or_default(),
                self.labels.clone(),
                self.multi_label,
            ),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct ClassifyArgs {
    /// Text to classify
    pub text: String,

    /// Candidate labels, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub labels: Vec<String>,

    #[arg(long)]
    pub multi_label: bool,

    /// Hypothesis template with a `{}` slot for the label
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct SummarizeArgs {
    /// Article URL
    pub url: String,

    /// Characters of article text sent to the model
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Use lead sentences only, no model call
    #[arg(long)]
    pub extractive: bool,
}

#[derive(Debug, clap::Args)]
pub struct NewsArgs {
    #[arg(long = "feed", required = true)]
    pub feeds: Vec<String>,

    #[arg(long)]
    pub label: String,

    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// How many top articles to summarize
    #[arg(long, default_value_t = 3)]
    pub top: usize,

    #[arg(long)]
    pub extractive: bool,

    /// Skip the document cache entirely
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, clap::Args)]
pub struct EvalArgs {
    #[arg(long, default_value = "snli")]
    pub dataset: String,

    #[arg(long, default_value = "plain_text")]
    pub config: String,

    #[arg(long, default_value = "validation")]
    pub split: String,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    #[arg(long, default_value_t = 100)]
    pub limit: usize,

    /// NLI model to evaluate; defaults to the configured one
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::Subcommand)]
pub enum CacheAction {
    /// Show cache row counts
    Stats,
    /// Remove expired entries
    Purge,
    /// Remove everything
    Clear,
}

#[derive(Debug, Clone, Copy, clap::Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn inference_settings(config: &Config) -> HttpSettings {
    HttpSettings {
        user_agent: config.sources.user_agent.clone(),
        timeout_secs: config.inference.timeout_secs,
    }
}

fn inference_client(config: &Config) -> anyhow::Result<InferenceClient> {
    InferenceClient::with_base_url(
        &inference_settings(config),
        config.inference.token.clone(),
        config.inference.api_url.clone(),
    )
    .context("Failed to build inference client")
}

fn open_cache(config: &Config) -> anyhow::Result<DocumentCache> {
    let cache = DocumentCache::open(&config.cache.path)
        .with_context(|| format!("Failed to open cache at {}", config.cache.path.display()))?;
    Ok(cache.with_ttl(config.cache.ttl_hours))
}

fn providers(
    config: &Config,
    source: Source,
    feeds: &[String],
) -> anyhow::Result<Vec<Box<dyn DocumentProvider>>> {
    let settings = config.sources.http_settings();
    let mut providers: Vec<Box<dyn DocumentProvider>> = Vec::new();

    match source {
        Source::Arxiv => {
            let client = ArxivClient::with_base_url(&settings, config.sources.arxiv_url.clone())?;
            providers.push(Box::new(ArxivProvider::from_client(client)));
        }
        Source::Feed => {
            let urls: &[String] = if feeds.is_empty() { &config.sources.feeds } else { feeds };
            if urls.is_empty() {
                bail!("No feeds given. Pass --feed URL or add feeds to the config file");
            }
            for url in urls {
                providers.push(Box::new(FeedProvider::new(&settings, url.clone())?));
            }
        }
    }

    Ok(providers)
}

/// How a command uses the document cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CachePolicy {
    /// Never touch the cache
    Bypass,
    /// Serve remembered queries, fetch the rest
    CacheFirst,
    /// Always fetch; the cache answers only when a source fails
    Refresh,
    /// Only read the cache
    Offline,
}

impl CachePolicy {
    fn new(no_cache: bool, offline: bool, fresh_by_default: bool) -> Self {
        match (no_cache, offline) {
            (true, _) => CachePolicy::Bypass,
            (false, true) => CachePolicy::Offline,
            (false, false) if fresh_by_default => CachePolicy::Refresh,
            (false, false) => CachePolicy::CacheFirst,
        }
    }
}

async fn fetch_documents(
    config: &Config,
    providers: Vec<Box<dyn DocumentProvider>>,
    query: &str,
    policy: CachePolicy,
) -> anyhow::Result<Vec<Document>> {
    let limit = config.sources.max_results;

    let docs = if policy != CachePolicy::Bypass && config.cache.enabled {
        let cache = Arc::new(open_cache(config)?);
        let offline = policy == CachePolicy::Offline || config.cache.offline_mode;
        let mut engine = CachedSearchEngine::with_cache(cache)
            .offline(offline)
            .refresh(policy == CachePolicy::Refresh);
        for provider in providers {
            engine.add_provider(provider);
        }
        engine.fetch_all(query, limit).await?
    } else {
        if policy == CachePolicy::Offline {
            bail!("--offline needs the cache enabled");
        }
        let mut engine = SearchEngine::new();
        for provider in providers {
            engine.add_provider(provider);
        }
        engine.fetch_all(query, limit).await?
    };

    info!("Fetched {} candidate documents", docs.len());
    Ok(docs)
}

/// BM25 scores with the configured parameters, best first
fn bm25_scores(config: &Config, docs: Vec<Document>, query: &str) -> Vec<(Document, f32)> {
    let texts: Vec<String> = docs.iter().map(Document::searchable_text).collect();
    let params = Bm25Params {
        k1: config.search.bm25_k1,
        b: config.search.bm25_b,
    };

    BM25Scorer::with_params(texts.as_slice(), params).score_all(&docs, query)
}

/// BM25 scores with non-matching documents dropped
fn keyword_scores(config: &Config, docs: Vec<Document>, query: &str) -> Vec<(Document, f32)> {
    bm25_scores(config, docs, query)
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .collect()
}

fn classifier(config: &Config, template: Option<&str>) -> anyhow::Result<ZeroShotClassifier> {
    let model = RemoteNliModel::new(inference_client(config)?, config.inference.nli_model.clone());
    let template = template.unwrap_or(&config.inference.hypothesis_template);
    ZeroShotClassifier::new(Arc::new(model))
        .with_template(template)
        .context("Invalid hypothesis template")
}

async fn summarize_text(
    config: &Config,
    text: &str,
    max_chars: Option<usize>,
    extractive: bool,
) -> anyhow::Result<SummaryOutcome> {
    let fallback = ExtractiveSummarizer::default();

    if extractive {
        let text = fallback.summarize(text).await.context("Nothing to summarize")?;
        return Ok(SummaryOutcome {
            text,
            method: fallback.name().to_string(),
            fell_back: false,
        });
    }

    let remote = RemoteSummarizer::new(
        inference_client(config)?,
        config.inference.summarization_model.clone(),
    )
    .with_params(SummaryParams {
        min_length: config.inference.summary_min_length,
        max_length: config.inference.summary_max_length,
    })
    .with_max_input_chars(max_chars.unwrap_or(config.inference.max_input_chars));

    summarize_with_fallback(&remote, &fallback, text)
        .await
        .context("Nothing to summarize")
}

/// Feeds are fetched fresh on every run; the cache covers failures
async fn rank_feeds(
    config: &Config,
    feeds: &[String],
    target: &RankTarget,
    no_cache: bool,
) -> anyhow::Result<Vec<ScoredDocument>> {
    let providers = providers(config, Source::Feed, feeds)?;
    let policy = CachePolicy::new(no_cache, false, true);
    let docs = fetch_documents(config, providers, "", policy).await?;

    let ranker = NewsRanker::new(classifier(config, None)?)
        .with_max_chars(config.inference.max_input_chars);
    Ok(ranker.rank(docs, target).await?)
}

pub async fn search(config: &Config, args: SearchArgs) -> anyhow::Result<()> {
    let limit = args.limit.unwrap_or(config.search.limit);
    let providers = providers(config, args.source, &args.feeds)?;
    let docs =
        fetch_documents(config, providers, &args.query, args.cache_policy()).await?;

    let mut results = match args.mode {
        SearchMode::Keyword => keyword_scores(config, docs, &args.query)
            .into_iter()
            .map(|(doc, score)| ScoredDocument::new(doc, score))
            .collect(),
        SearchMode::Semantic if args.no_cache => {
            let embedder = EmbeddingGenerator::new(config.semantic.model.clone());
            rank_by_similarity(&embedder, &docs, &args.query).await?
        }
        SearchMode::Semantic => {
            let engine = SemanticSearchEngine::new(config.semantic.clone())?;
            engine.index_documents(&docs).await?;
            let results = engine.search(&args.query, limit).await?;
            engine.save().await?;
            results.into_iter().map(|r| r.into_scored()).collect()
        }
        SearchMode::Hybrid => {
            let engine = SemanticSearchEngine::new(config.semantic.clone())?;
            let keyword = bm25_scores(config, docs, &args.query);
            let results = engine.hybrid_search(&args.query, keyword, limit).await?;
            if !args.no_cache {
                engine.save().await?;
            }
            results.into_iter().map(|r| r.into_scored()).collect()
        }
    };

    results.truncate(limit);
    output::print_results(&results);
    output::export(&results, args.export.as_deref())
}

pub async fn rank(config: &Config, args: RankArgs) -> anyhow::Result<()> {
    let mut results = rank_feeds(config, &args.feeds, &args.target(), args.no_cache).await?;
    results.truncate(args.limit.unwrap_or(config.search.limit));
    output::print_results(&results);
    output::export(&results, args.export.as_deref())
}

pub async fn classify(config: &Config, args: ClassifyArgs) -> anyhow::Result<()> {
    let classification = classifier(config, args.template.as_deref())?
        .classify(&args.text, &args.labels, args.multi_label)
        .await?;
    output::print_classification(&classification);
    Ok(())
}

pub async fn summarize(config: &Config, args: SummarizeArgs) -> anyhow::Result<()> {
    let page = PageClient::new(&config.sources.http_settings())?
        .extract(&args.url)
        .await
        .with_context(|| format!("Failed to extract {}", args.url))?;

    let outcome = summarize_text(config, &page.text, args.max_chars, args.extractive).await?;
    output::print_summary(&page.title, &outcome);
    Ok(())
}

/// Article text for summarizing: the linked page, else whatever the feed carried
async fn article_body(pages: &PageClient, doc: &Document) -> String {
    if !doc.link.is_empty() {
        match pages.extract(&doc.link).await {
            Ok(page) if !page.text.trim().is_empty() => return page.text,
            Ok(_) => warn!("No readable text at {}", doc.link),
            Err(e) => warn!("Could not fetch {}: {}", doc.link, e),
        }
    }

    doc.content
        .clone()
        .or_else(|| doc.summary.clone())
        .unwrap_or_else(|| doc.title.clone())
}

pub async fn news(config: &Config, args: NewsArgs) -> anyhow::Result<()> {
    let target = RankTarget::label(args.label.clone(), args.labels.clone(), false);
    let ranked = rank_feeds(config, &args.feeds, &target, args.no_cache).await?;
    if ranked.is_empty() {
        println!("No articles found.");
        return Ok(());
    }

    let pages = PageClient::new(&config.sources.http_settings())?;

    for (i, result) in ranked.iter().take(args.top).enumerate() {
        let doc = &result.document;
        let body = article_body(&pages, doc).await;

        println!("{}. {:.4}  {}", i + 1, result.score, doc.title);
        if !doc.link.is_empty() {
            println!("   {}", doc.link);
        }
        match summarize_text(config, &body, None, args.extractive).await {
            Ok(outcome) => println!("   {}", outcome.text),
            Err(e) => warn!("No summary for {}: {:#}", doc.doc_id(), e),
        }
        println!();
    }

    Ok(())
}

pub async fn nli_eval(config: &Config, args: EvalArgs) -> anyhow::Result<()> {
    let settings = inference_settings(config);
    let datasets = DatasetClient::new(&settings, config.inference.token.clone())?;
    let request = RowsRequest::new(&args.dataset, &args.config, &args.split)
        .offset(args.offset)
        .length(args.limit);

    let rows = datasets
        .nli_rows(&request)
        .await
        .with_context(|| format!("Failed to load {}/{}/{}", args.dataset, args.config, args.split))?;
    let examples = examples_from_rows(rows);

    let model_name = args.model.unwrap_or_else(|| config.inference.nli_model.clone());
    let model = RemoteNliModel::new(inference_client(config)?, model_name);

    let report = evaluate(&model, &examples).await;
    output::print_report(&report);
    Ok(())
}

pub fn cache(config: &Config, action: CacheAction) -> anyhow::Result<()> {
    let cache = open_cache(config)?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("path:      {}", config.cache.path.display());
            println!("documents: {}", stats.documents);
            println!("expired:   {}", stats.expired);
            println!("queries:   {}", stats.queries);
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired()?;
            println!("Removed {} expired entries", removed);
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("Cache cleared");
        }
    }

    Ok(())
}

pub fn config(config: &Config, path: Option<&Path>, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.inference.token.is_some() {
                shown.inference.token = Some("********".into());
            }
            print!("{}", shown.to_toml()?);
        }
        ConfigAction::Init { force } => {
            let path = match path {
                Some(path) => path.to_path_buf(),
                None => Config::config_path()?,
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docscout_core::SourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_keyword_scores_drop_misses() {
        let docs = vec![
            Document::new(SourceKind::Arxiv, "1", "Graph neural networks"),
            Document::new(SourceKind::Arxiv, "2", "Protein folding"),
        ];
        let scores = keyword_scores(&Config::default(), docs, "neural networks");
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].0.id, "1");
    }

    #[test]
    fn test_feed_source_needs_urls() {
        let mut config = Config::default();
        config.sources.feeds.clear();
        assert!(providers(&config, Source::Feed, &[]).is_err());

        let feeds = vec!["https://example.com/rss".to_string()];
        let built = providers(&config, Source::Feed, &feeds).unwrap();
        assert_eq!(built[0].name(), "feed:https://example.com/rss");
    }

    #[test]
    fn test_rank_target_from_args() {
        let args = RankArgs {
            feeds: vec![],
            label: Some("sports".into()),
            labels: vec!["politics".into()],
            multi_label: true,
            hypothesis: None,
            limit: None,
            export: None,
            no_cache: false,
        };
        match args.target() {
            RankTarget::Label {
                candidates,
                multi_label,
                ..
            } => {
                assert_eq!(candidates, vec!["sports", "politics"]);
                assert!(multi_label);
            }
            RankTarget::Hypothesis(_) => unreachable!(),
        }
    }

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DocumentProvider for CountingProvider {
        fn name(&self) -> String {
            "feed:https://example.com/rss".into()
        }

        async fn fetch(&self, _query: &str, _limit: usize) -> docscout_core::Result<Vec<Document>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Document::new(SourceKind::Feed, format!("story-{}", n), "Story")])
        }
    }

    async fn fetch_twice(config: &Config, policy: CachePolicy) -> usize {
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let providers: Vec<Box<dyn DocumentProvider>> =
                vec![Box::new(CountingProvider { calls: calls.clone() })];
            fetch_documents(config, providers, "", policy).await.unwrap();
        }
        calls.load(Ordering::SeqCst)
    }

    fn config_with_cache(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.cache.enabled = true;
        config.cache.path = dir.path().join("cache.db");
        config
    }

    #[test]
    fn test_cache_policy_from_flags() {
        assert_eq!(CachePolicy::new(true, false, true), CachePolicy::Bypass);
        assert_eq!(CachePolicy::new(false, true, true), CachePolicy::Offline);
        assert_eq!(CachePolicy::new(false, false, true), CachePolicy::Refresh);
        assert_eq!(CachePolicy::new(false, false, false), CachePolicy::CacheFirst);
    }

    #[tokio::test]
    async fn test_feed_ranking_fetches_fresh_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_cache(&dir);

        assert_eq!(fetch_twice(&config, CachePolicy::new(false, false, true)).await, 2);
        assert_eq!(fetch_twice(&config, CachePolicy::Bypass).await, 2);
    }

    #[tokio::test]
    async fn test_search_reuses_cached_query() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_cache(&dir);

        assert_eq!(fetch_twice(&config, CachePolicy::CacheFirst).await, 1);
    }

    #[tokio::test]
    async fn test_extractive_summary_needs_no_model() {
        let outcome = summarize_text(
            &Config::default(),
            "First sentence here. Second one. Third. Fourth.",
            None,
            true,
        )
        .await
        .unwrap();
        assert_eq!(outcome.text, "First sentence here. Second one. Third.");
        assert!(!outcome.fell_back);
    }

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        config(&Config::default(), Some(&path), ConfigAction::Init { force: false }).unwrap();
        assert!(path.exists());
        assert!(config(&Config::default(), Some(&path), ConfigAction::Init { force: false }).is_err());
        assert!(config(&Config::default(), Some(&path), ConfigAction::Init { force: true }).is_ok());
    }

    #[test]
    fn test_cache_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.path = dir.path().join("cache.db");

        cache(&config, CacheAction::Stats).unwrap();
        cache(&config, CacheAction::Purge).unwrap();
        cache(&config, CacheAction::Clear).unwrap();
    }
}

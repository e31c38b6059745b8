mod commands;
mod output;

use anyhow::Context;
use clap::Parser;
use commands::{
    CacheAction, ClassifyArgs, ConfigAction, EvalArgs, NewsArgs, RankArgs, SearchArgs,
    SummarizeArgs,
};
use docscout_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docscout")]
#[command(version, about = "Find, rank and summarize papers and news from the terminal", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "DOCSCOUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Search arXiv or feeds by keyword, embedding similarity or both
    Search(SearchArgs),
    /// Rank feed articles by a zero-shot label
    Rank(RankArgs),
    /// Zero-shot classify a piece of text
    Classify(ClassifyArgs),
    /// Summarize the article at a URL
    Summarize(SummarizeArgs),
    /// Rank feed articles, then summarize the best ones
    News(NewsArgs),
    /// Evaluate the NLI model on a labeled dataset
    NliEval(EvalArgs),
    /// Manage the document cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so results can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docscout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // `config init` must work before any config file exists
    let config = match (&cli.command, &cli.config) {
        (Commands::Config { action: ConfigAction::Init { .. } }, _) => Config::default(),
        (_, Some(path)) => Config::load_from(path).context("Failed to load config")?,
        (_, None) => Config::load().context("Failed to load config")?,
    };

    match cli.command {
        Commands::Search(args) => {
            tracing::info!("Searching for: {}", args.query);
            commands::search(&config, args).await
        }
        Commands::Rank(args) => commands::rank(&config, args).await,
        Commands::Classify(args) => commands::classify(&config, args).await,
        Commands::Summarize(args) => commands::summarize(&config, args).await,
        Commands::News(args) => commands::news(&config, args).await,
        Commands::NliEval(args) => commands::nli_eval(&config, args).await,
        Commands::Cache { action } => commands::cache(&config, action),
        Commands::Config { action } => commands::config(&config, cli.config.as_deref(), action),
    }
}

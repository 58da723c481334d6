use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use deep_search::agents::{ResearchOptions, ResearchPipeline};
use deep_search::routes::deep_search::persist_report;
use deep_search::search::SearchFilters;
use deep_search::utils::{init_logger, DEFAULT_LOG_FILTER};
use deep_search::{create_router, AppState, Config};

/// Recursive web deep-research service
#[derive(Parser)]
#[command(name = "deep-search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Run one investigation and print the report to stdout
    Research(ResearchArgs),
}

#[derive(Args)]
struct ResearchArgs {
    /// What to research
    #[arg(short, long)]
    prompt: String,

    /// Recursion levels; replaced by the number of --focus topics when given
    #[arg(short, long, default_value_t = 2)]
    depth: u32,

    /// Queries per level (1-7)
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u16).range(1..=7))]
    breadth: u16,

    /// Focus topic, one per depth level, outermost first
    #[arg(long = "focus")]
    focus: Vec<String>,

    /// Vector store id to consult for every planned query
    #[arg(long)]
    knowledge_base: Option<String>,

    /// File with custom report instructions
    #[arg(long)]
    system_prompt_file: Option<PathBuf>,

    #[arg(long)]
    start_published_date: Option<String>,

    #[arg(long)]
    end_published_date: Option<String>,

    #[arg(long = "include-domain")]
    include_domains: Vec<String>,

    #[arg(long = "exclude-domain")]
    exclude_domains: Vec<String>,

    #[arg(long)]
    include_text: Vec<String>,

    #[arg(long)]
    exclude_text: Vec<String>,
}

impl ResearchArgs {
    fn options(&self) -> ResearchOptions {
        fn list(values: &[String]) -> Option<Vec<String>> {
            (!values.is_empty()).then(|| values.to_vec())
        }

        ResearchOptions {
            filters: SearchFilters {
                start_published_date: self.start_published_date.clone(),
                end_published_date: self.end_published_date.clone(),
                include_domains: list(&self.include_domains),
                exclude_domains: list(&self.exclude_domains),
                include_text: list(&self.include_text),
                exclude_text: list(&self.exclude_text),
            }
            .normalized(),
            focus_topics: self
                .focus
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            knowledge_base_id: self.knowledge_base.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger(DEFAULT_LOG_FILTER);

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let pipeline = Arc::new(ResearchPipeline::from_config(&config)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pipeline).await,
        Command::Research(args) => research(config, pipeline, args).await,
    }
}

async fn serve(config: Config, pipeline: Arc<ResearchPipeline>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid HOST/PORT")?;

    let state = AppState { config, pipeline };
    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn research(
    config: Config,
    pipeline: Arc<ResearchPipeline>,
    args: ResearchArgs,
) -> anyhow::Result<()> {
    let options = args.options();
    let depth = if options.focus_topics.is_empty() {
        args.depth
    } else {
        options.focus_topics.len() as u32
    };

    let system_prompt = match &args.system_prompt_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    let report = pipeline
        .execute(
            &options,
            &args.prompt,
            depth,
            usize::from(args.breadth),
            system_prompt.as_deref(),
        )
        .await?;

    if let Some(path) = &config.research.report_output_path {
        persist_report(path, &report).await;
    }

    println!("{}", report);
    Ok(())
}

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use dyel::config::Settings;
use dyel::constants::DEFAULT_MATCH_ID_COUNT;
use dyel::rate_limiter::RateLimiter;
use dyel::{cancel_pair, infra, logging, metrics, EntityKind, IngestOutcome, IngestReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dyel")]
#[command(about = "Download Riot Games summoner and match data into an object store")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML settings file (defaults to ./dyel.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Download again even when the object is already stored
    #[arg(long, global = true)]
    force: bool,

    /// Entities processed at the same time
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download summoner data by summoner name
    Summoners {
        #[command(flatten)]
        ids: IdSource,
    },
    /// Download match data by match id
    Matches {
        #[command(flatten)]
        ids: IdSource,
    },
    /// Download the match id list of players by puuid
    MatchIds {
        #[command(flatten)]
        ids: IdSource,
        /// Index of the first match id
        #[arg(long, default_value_t = 0)]
        start: u32,
        /// Number of match ids per player
        #[arg(long, default_value_t = DEFAULT_MATCH_ID_COUNT)]
        count: u32,
    },
}

#[derive(Args)]
struct IdSource {
    /// Entity id; repeat the flag for several
    #[arg(long = "id", short = 'i')]
    ids: Vec<String>,

    /// File with one id per line
    #[arg(long)]
    ids_file: Option<PathBuf>,
}

/// Flag ids followed by file ids. Supplying neither is an error.
fn collect_ids(flag_ids: Vec<String>, ids_file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    if flag_ids.is_empty() && ids_file.is_none() {
        bail!("pass at least one --id or an --ids-file");
    }

    let mut ids = flag_ids;
    if let Some(path) = ids_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading ids file {}", path.display()))?;
        let from_file: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if from_file.is_empty() {
            warn!(path = %path.display(), "ids file is empty");
        }
        ids.extend(from_file);
    }
    Ok(ids)
}

/// CLI flags win over file and environment values; validation runs last.
fn resolve_settings(cli: &Cli, mut settings: Settings) -> anyhow::Result<Settings> {
    if let Some(concurrency) = cli.concurrency {
        settings.ingest.concurrency = concurrency;
    }
    if cli.force {
        settings.ingest.force_download = true;
    }
    settings.validate()?;
    Ok(settings)
}

fn print_report(report: &IngestReport) {
    println!("\nIngest run {} ({})", report.run_id, report.kind.label());
    for entry in &report.entries {
        let marker = match entry.outcome {
            IngestOutcome::Stored { .. } => "+",
            IngestOutcome::Skipped { .. } => "=",
            IngestOutcome::Failed(_) => "!",
            IngestOutcome::Cancelled => "x",
        };
        println!("  {} {}: {}", marker, entry.id, entry.outcome);
    }
    let s = report.summary();
    println!(
        "Stored: {}  Skipped: {}  Failed: {}  Cancelled: {}  ({} ms)",
        s.stored,
        s.skipped,
        s.failed,
        s.cancelled,
        (report.finished_at - report.started_at).num_milliseconds()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logging();
    let cli = Cli::parse();

    let settings = resolve_settings(&cli, Settings::load(cli.config.as_deref())?)?;
    let force = settings.ingest.force_download;

    if let Some(port) = cli.metrics_port {
        metrics::init_metrics(port);
    }

    let (kind, source) = match cli.command {
        Commands::Summoners { ids } => (EntityKind::Summoners, ids),
        Commands::Matches { ids } => (EntityKind::Matches, ids),
        Commands::MatchIds { ids, start, count } => (
            EntityKind::MatchIds {
                offset: start,
                count,
            },
            ids,
        ),
    };
    let ids = collect_ids(source.ids, source.ids_file.as_deref())?;
    info!(kind = kind.label(), count = ids.len(), force, "downloading");

    let limiter = Arc::new(RateLimiter::new());
    let use_case = infra::build_ingest_use_case(&settings, limiter)?;

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling ingest run");
            cancel_handle.cancel();
        }
    });

    let report = use_case.ingest(kind, &ids, force, &cancel).await;
    print_report(&report);

    if !report.is_clean() {
        let s = report.summary();
        bail!("{} failed, {} cancelled", s.failed, s.cancelled);
    }
    Ok(())
}

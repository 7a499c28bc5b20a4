use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use wayback_acquire::{retrieve_snapshots, text, IndexClient, RetrievalConfig, RunError};
use wayback_model::{DateRange, SnapshotId, SnapshotStore};

mod prompt;

use prompt::{Prompter, Selection};

#[derive(Parser)]
#[command(name = "wb-scraper")]
#[command(about = "Retrieve archived snapshots of a page from the Wayback Machine")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Commands {
    /// Download snapshots of a page into <output-dir>/<site>/<timestamp>.html
    Scrape {
        /// Exact URL to look up in the archive
        #[arg(short, long)]
        url: String,

        /// Directory in which the site folder is created
        #[arg(short = 'O', long, default_value = ".")]
        output_dir: String,

        /// Don't ask for confirmation before downloading
        #[arg(short, long)]
        yes: bool,

        /// Retrieve every capture
        #[arg(long, conflicts_with_all = ["from", "to"])]
        all: bool,

        /// First day of the range to retrieve (YYYYMMDD)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Last day of the range to retrieve (YYYYMMDD)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Convert saved pages to text without asking
        #[arg(long, conflicts_with = "no_text")]
        text: bool,

        /// Skip the text conversion without asking
        #[arg(long)]
        no_text: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the captures the archive holds for a page
    List {
        /// Exact URL to look up in the archive
        #[arg(short, long)]
        url: String,

        /// Print every capture, not just the count and span
        #[arg(short, long)]
        verbose: bool,
    },

    /// Strip HTML from saved snapshots into "<folder>/text files"
    Text {
        /// Folder holding the saved .html snapshots
        #[arg(short, long)]
        folder: String,
    },
}

struct ScrapeArgs {
    url: String,
    output_dir: String,
    yes: bool,
    all: bool,
    range: Option<(String, String)>,
    text: Option<bool>,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Map log level, suppressing noisy HTML-parsing crates at debug/trace
    let level = match cli.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }

    match cli.command {
        Commands::Scrape {
            url,
            output_dir,
            yes,
            all,
            from,
            to,
            text,
            no_text,
            json,
        } => {
            let text = match (text, no_text) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            scrape(ScrapeArgs {
                url,
                output_dir,
                yes,
                all,
                range: from.zip(to),
                text,
                json,
            })
            .await?;
        }
        Commands::List { url, verbose } => {
            let captures = IndexClient::new()?.captures(&url).await?;
            if captures.is_empty() {
                println!("No captures found.");
                return Ok(());
            }
            println!("{}", describe_captures(&url, &captures));
            if verbose {
                for id in &captures {
                    let when = id
                        .datetime()
                        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| id.display_date());
                    println!("{id}  {when}");
                }
            }
        }
        Commands::Text { folder } => {
            let store = SnapshotStore::new(&folder);
            anyhow::ensure!(store.folder().is_dir(), "{folder} is not a directory");
            off_runtime(move || convert_to_text(&store)).await?;
        }
    }

    Ok(())
}

async fn scrape(args: ScrapeArgs) -> Result<()> {
    let captures = IndexClient::new()?.captures(&args.url).await?;
    if captures.is_empty() {
        println!("No captures found.");
        return Ok(());
    }

    println!("\n{}", describe_captures(&args.url, &captures));

    if !args.yes && !off_runtime(|| Ok(Prompter::stdio().confirm("Continue?")?)).await? {
        return Ok(());
    }

    let selected = if args.all {
        captures
    } else if let Some((from, to)) = &args.range {
        DateRange::from_days(from, to)?.select(&captures)?
    } else {
        off_runtime(move || {
            let mut prompter = Prompter::stdio();
            Ok(match prompter.selection()? {
                Selection::All => captures,
                Selection::Range => prompter.date_range(&captures)?,
            })
        })
        .await?
    };

    let store = SnapshotStore::for_url(&args.output_dir, &args.url);
    println!(
        "{} snapshots found. Creating files in {}...",
        selected.len(),
        store.folder().display()
    );

    let cancel = CancellationToken::new();
    let config = RetrievalConfig::default();
    let retrieval = retrieve_snapshots(&args.url, &selected, store.clone(), &config, &cancel);
    tokio::pin!(retrieval);

    let summary = tokio::select! {
        summary = &mut retrieval => summary?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupt received, cancelling retrieval");
            cancel.cancel();
            retrieval.await?;
            return Err(RunError::Cancelled.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }

    let convert = match args.text {
        Some(choice) => choice,
        None => {
            let saved = text::html_files(&store)?.len();
            let question = format!("Strip HTML and create {saved} text files?");
            off_runtime(move || Ok(Prompter::stdio().confirm(&question)?)).await?
        }
    };
    if convert {
        println!("Creating files in {}...", store.text_dir().display());
        off_runtime(move || convert_to_text(&store)).await?;
    }

    Ok(())
}

/// Run blocking terminal or file work on its own thread, giving up on Ctrl-C.
///
/// Runtime shutdown waits for `spawn_blocking` tasks, and a stdin read never
/// returns on its own, so this uses a detached thread.
async fn off_runtime<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });

    tokio::select! {
        done = rx => done.context("worker thread exited without a result")?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
    }
}

fn convert_to_text(store: &SnapshotStore) -> Result<()> {
    let result = text::convert_folder(store)?;
    if result.failed > 0 {
        tracing::warn!(failed = result.failed, "Some snapshots could not be converted");
    }
    println!("{} files created.", result.written);
    Ok(())
}

fn describe_captures(url: &str, captures: &[SnapshotId]) -> String {
    match (captures.first(), captures.last()) {
        (Some(first), Some(last)) => format!(
            "Found {} captures for the site {url} from {} to {}.",
            captures.len(),
            first.display_date(),
            last.display_date()
        ),
        _ => "No captures found.".to_string(),
    }
}

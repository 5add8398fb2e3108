//! httpeat main entry point
//!
//! This is the command-line interface for the httpeat harvester.

use anyhow::Context;
use clap::Parser;
use httpeat::config::{load_config, read_list_file, Config};
use httpeat::output::{load_statistics, print_statistics, print_summary, spawn_progress};
use httpeat::storage::session::LOG_FILE;
use httpeat::storage::Session;
use httpeat::Httpeat;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// httpeat: a resumable, concurrent HTTP harvester
///
/// httpeat crawls HTTP directory indexes and downloads the files they list
/// into <SESSION_DIR>/data. Every item's state is kept in the session
/// directory, so an interrupted session picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "httpeat")]
#[command(version)]
#[command(about = "Resumable, concurrent harvester for HTTP directory indexes", long_about = None)]
struct Cli {
    /// Session directory
    #[arg(value_name = "SESSION_DIR")]
    session_dir: PathBuf,

    /// Target URLs, or files listing one URL per line; a URL ending with
    /// '/' is crawled as a directory index
    #[arg(value_name = "TARGETS")]
    targets: Vec<String>,

    /// Resume an existing session
    #[arg(short, long)]
    resume: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mirror rule '<mirror-url> mirrors <canonical-url>', or a file of rules
    #[arg(short, long, value_name = "RULE")]
    mirror: Vec<String>,

    /// Proxy '<proxy-url> [tasks-count=<n>]', or a file of proxies
    #[arg(short = 'x', long, value_name = "PROXY")]
    proxy: Vec<String>,

    /// Concurrent downloads per lane
    #[arg(short = 't', long = "tasks", value_name = "N")]
    tasks_count: Option<usize>,

    /// Request timeout in seconds
    #[arg(short = 'T', long, value_name = "SECONDS")]
    timeout: Option<f64>,

    /// Skip rule: dl-size-gt:<size>, dl-path:<regex> or idx-path:<regex>
    #[arg(short, long, value_name = "RULE")]
    skip: Vec<String>,

    /// Delay after each request, in seconds
    #[arg(short, long, value_name = "SECONDS")]
    wait: Option<f64>,

    /// User-Agent header to send
    #[arg(short = 'U', long, value_name = "UA")]
    user_agent: Option<String>,

    /// Do not verify TLS certificates
    #[arg(short = 'k', long)]
    no_ssl_verify: bool,

    /// Only crawl directory indexes
    #[arg(short, long, conflicts_with = "download_only")]
    index_only: bool,

    /// Only download files already known to the session
    #[arg(short, long)]
    download_only: bool,

    /// Do not draw progress bars
    #[arg(short = 'P', long)]
    no_progress: bool,

    /// Network error retries per downloaded file
    #[arg(long, value_name = "N")]
    retry_dl_networkerror: Option<u32>,

    /// Network error retries per directory index
    #[arg(long, value_name = "N")]
    retry_index_networkerror: Option<u32>,

    /// Retries of any other error, for the whole run
    #[arg(long, value_name = "N")]
    retry_global_error: Option<u32>,

    /// Maximum byte length of a local file name
    #[arg(long, value_name = "BYTES")]
    name_max: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics of the session and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    if cli.stats {
        setup_logging(cli.verbose, cli.quiet, false, None);
        handle_stats(&cli.session_dir)?;
        return Ok(0);
    }

    let progress =
        !cli.no_progress && !cli.quiet && cli.verbose == 0 && std::io::stderr().is_terminal();

    // The log file lives in the session directory, which a new session may
    // still have to create
    if !cli.resume {
        std::fs::create_dir_all(&cli.session_dir).with_context(|| {
            format!("cannot create session directory {}", cli.session_dir.display())
        })?;
    }
    let log_dir = cli.session_dir.is_dir().then_some(cli.session_dir.as_path());
    let _guard = setup_logging(cli.verbose, cli.quiet, progress, log_dir);

    let config = build_config(&cli)?;
    handle_harvest(config, progress, cli.quiet).await
}

/// Sets up the logging/tracing subscriber
///
/// The console follows the verbosity flags, and only shows warnings while
/// progress bars are drawn. The session log file always records at least
/// info level.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    progress: bool,
    log_dir: Option<&Path>,
) -> Option<WorkerGuard> {
    let console_filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else if progress {
        EnvFilter::new("warn")
    } else {
        verbosity_filter(verbose)
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(verbosity_filter(verbose));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

fn verbosity_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("httpeat=info,warn"),
        1 => EnvFilter::new("httpeat=debug,info"),
        2 => EnvFilter::new("httpeat=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Builds the run configuration: the config file if any, overlaid with the
/// command line
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("cannot load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    config.session_dir = cli.session_dir.clone();
    config.session_new = !cli.resume;

    config.target_urls.extend(expand_list_args(&cli.targets)?);
    config.mirror.extend(expand_list_args(&cli.mirror)?);
    config.proxy.extend(expand_list_args(&cli.proxy)?);
    config.skip.extend(cli.skip.iter().cloned());

    if let Some(tasks_count) = cli.tasks_count {
        config.tasks_count = tasks_count;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    if let Some(wait) = cli.wait {
        config.wait = wait;
    }
    if let Some(user_agent) = &cli.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    if let Some(retries) = cli.retry_dl_networkerror {
        config.retry_dl_networkerror = retries;
    }
    if let Some(retries) = cli.retry_index_networkerror {
        config.retry_index_networkerror = retries;
    }
    if let Some(retries) = cli.retry_global_error {
        config.retry_global_error = retries;
    }
    if let Some(name_max) = cli.name_max {
        config.name_max = name_max;
    }
    config.no_ssl_verify |= cli.no_ssl_verify;
    config.index_only |= cli.index_only;
    config.download_only |= cli.download_only;

    Ok(config)
}

/// Expands arguments that name an existing file into the entries it lists
fn expand_list_args(args: &[String]) -> anyhow::Result<Vec<String>> {
    let mut entries = Vec::new();
    for arg in args {
        let path = Path::new(arg);
        if !arg.contains("://") && path.is_file() {
            let listed = read_list_file(path)
                .with_context(|| format!("cannot read list file {}", path.display()))?;
            tracing::debug!("Read {} entries from {}", listed.len(), path.display());
            entries.extend(listed);
        } else {
            entries.push(arg.clone());
        }
    }
    Ok(entries)
}

/// Handles the --stats mode: shows statistics from the session ledgers
fn handle_stats(session_dir: &Path) -> anyhow::Result<()> {
    let session = Session::open(session_dir)?;
    println!("Session: {}\n", session.dir().display());

    let stats = load_statistics(&session)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, progress: bool, quiet: bool) -> anyhow::Result<u8> {
    if config.session_new {
        tracing::info!("Starting new session in {}", config.session_dir.display());
    } else {
        tracing::info!("Resuming session in {}", config.session_dir.display());
    }

    let show_index = !config.download_only;
    let httpeat = Httpeat::new(config).context("cannot start the harvest")?;

    let display = spawn_progress(progress, httpeat.progress(), show_index);
    let result = httpeat
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                // Without a signal handler, only completion ends the run
                std::future::pending::<()>().await;
            }
        })
        .await;
    display.finish().await;

    let summary = result.context("harvest failed")?;
    if !quiet {
        print_summary(&summary);
    }
    Ok(u8::try_from(summary.exit_code()).unwrap_or(1))
}

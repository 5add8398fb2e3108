//! Harvest orchestration
//!
//! This module ties a run together, including:
//! - Creating or reopening the session and merging its list files
//! - Opening both item stores and seeding them with the targets
//! - Running the index crawl and the download dispatcher side by side
//! - Handling interrupts and checkpointing the ledgers

use crate::config::{parse_mirrors, validate, validate_proxies, Config};
use crate::crawler::context::CrawlContext;
use crate::crawler::fetcher::ClientOptions;
use crate::crawler::indexer::IndexCrawler;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::{build_lanes, Lane, Scheduler};
use crate::skip::SkipFilter;
use crate::state::{Phase, ProgressStats};
use crate::storage::session::{MIRRORS_FILE, PROXIES_FILE, TARGETS_FILE};
use crate::storage::{Session, StateStore};
use crate::url::{parse_target, PathEncoder, TargetKind};
use crate::HttpeatError;
use std::future::Future;
use std::sync::Arc;

/// Exit status of an interrupted run
pub const EXIT_INTERRUPTED: i32 = 130;

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub index: ProgressStats,
    pub download: ProgressStats,
    /// Items that gave up, in the order they failed
    pub warnings: Vec<String>,
    /// The run stopped on a shutdown signal before draining
    pub interrupted: bool,
}

impl RunSummary {
    /// Process exit code for this outcome
    ///
    /// Failed items do not make a run fail; only an interruption changes
    /// the code.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else {
            0
        }
    }
}

/// Cloneable access to the live counters of a run
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    index: Arc<StateStore>,
    download: Arc<StateStore>,
}

impl ProgressHandle {
    pub fn index(&self) -> ProgressStats {
        self.index.stats()
    }

    pub fn download(&self) -> ProgressStats {
        self.download.stats()
    }

    pub fn phase(&self, phase: Phase) -> ProgressStats {
        match phase {
            Phase::Index => self.index(),
            Phase::Download => self.download(),
        }
    }
}

/// A configured harvest, ready to run
pub struct Httpeat {
    config: Config,
    session: Session,
    ctx: Arc<CrawlContext>,
    index_lanes: Vec<Arc<Lane>>,
    download_lanes: Vec<Arc<Lane>>,
}

impl Httpeat {
    /// Prepares a run
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Httpeat)` - Session opened, stores loaded and targets seeded
    /// * `Err(HttpeatError)` - Invalid configuration, unusable session
    ///   directory, or a ledger that cannot be read or written
    pub fn new(config: Config) -> Result<Self, HttpeatError> {
        validate(&config)?;

        let session = if config.session_new {
            Session::create(&config.session_dir)?
        } else {
            Session::open(&config.session_dir)?
        };

        // Lists given for this run extend the ones the session already has
        let targets = session.merge_list(TARGETS_FILE, &config.target_urls)?;
        let mirrors = parse_mirrors(&session.merge_list(MIRRORS_FILE, &config.mirror)?)?;
        let proxies = validate_proxies(&session.merge_list(PROXIES_FILE, &config.proxy)?)?;

        let index = StateStore::open(Phase::Index, &session.ledger_path(Phase::Index))?;
        let download = StateStore::open(Phase::Download, &session.ledger_path(Phase::Download))?;

        let ctx = Arc::new(CrawlContext::new(
            index,
            download,
            SkipFilter::parse(&config.skip)?,
            PathEncoder::new(session.data_dir(), config.name_max),
            RetryPolicy::from_config(&config),
        ));

        let options = ClientOptions::from_config(&config);
        let download_lanes = build_lanes(&options, &proxies, &mirrors, config.tasks_count)?;
        let index_lanes = build_lanes(
            &options.with_decompress(true),
            &proxies,
            &[],
            config.tasks_count,
        )?;

        for target in &targets {
            let url = parse_target(target)?;
            match TargetKind::of(&url) {
                TargetKind::Directory => ctx.add_directory(url)?,
                TargetKind::Leaf => ctx.enqueue_download(url, None)?,
            };
        }

        tracing::info!(
            "Session {}: {} targets, {} mirrors, {} proxies",
            session.dir().display(),
            targets.len(),
            mirrors.len(),
            proxies.len()
        );

        Ok(Self {
            config,
            session,
            ctx,
            index_lanes,
            download_lanes,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a handle for polling progress while the run is going
    pub fn progress(&self) -> ProgressHandle {
        ProgressHandle {
            index: Arc::clone(&self.ctx.index),
            download: Arc::clone(&self.ctx.download),
        }
    }

    /// Warnings collected so far
    pub fn warnings(&self) -> Vec<String> {
        self.ctx.warnings()
    }

    /// Runs until every item is terminal
    pub async fn run(&self) -> Result<RunSummary, HttpeatError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs until every item is terminal or `shutdown` resolves
    ///
    /// On shutdown, in-flight items are abandoned: their partial files are
    /// removed and they stay pending for the next run. Both ledgers are
    /// checkpointed whatever the outcome.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunSummary, HttpeatError>
    where
        F: Future<Output = ()>,
    {
        let drive = self.drive();
        tokio::pin!(drive);
        let finished = tokio::select! {
            result = &mut drive => Some(result),
            () = shutdown => None,
        };
        let (outcome, interrupted) = match finished {
            Some(result) => (result, false),
            None => {
                tracing::warn!("Interrupted, pending items are kept for the next run");
                self.ctx.stop();
                (drive.await, true)
            }
        };

        let checkpoint = self.checkpoint();
        outcome?;
        checkpoint?;

        let summary = self.summary(interrupted);
        tracing::info!(
            "Run {}: {} files ok, {} failed, {} skipped",
            if interrupted { "interrupted" } else { "finished" },
            summary.download.items_ok,
            summary.download.items_error,
            summary.download.items_skipped
        );
        Ok(summary)
    }

    async fn drive(&self) -> Result<(), HttpeatError> {
        let crawl = async {
            if !self.config.download_only {
                IndexCrawler::new(Arc::clone(&self.ctx), self.index_lanes.clone())
                    .run()
                    .await?;
            }
            // No more files can appear once the crawl is over
            self.ctx.download.seal();
            Ok::<(), HttpeatError>(())
        };

        if self.config.index_only {
            return crawl.await;
        }

        let scheduler = Scheduler::new(Arc::clone(&self.ctx), self.download_lanes.clone());
        tokio::try_join!(crawl, scheduler.run())?;
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), HttpeatError> {
        self.ctx.index.checkpoint()?;
        self.ctx.download.checkpoint()?;
        Ok(())
    }

    fn summary(&self, interrupted: bool) -> RunSummary {
        RunSummary {
            index: self.ctx.index.stats(),
            download: self.ctx.download.stats(),
            warnings: self.ctx.warnings(),
            interrupted,
        }
    }
}

impl std::fmt::Debug for Httpeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Httpeat")
            .field("session", &self.session)
            .field("index_lanes", &self.index_lanes.len())
            .field("download_lanes", &self.download_lanes.len())
            .finish()
    }
}

//! Lanes and the download dispatcher
//!
//! This module handles:
//! - Building egress lanes: one per proxy (or a direct one), each paired
//!   with every mirror rule as extra lanes
//! - Bounding concurrency per lane
//! - Assigning pending items to the least-loaded lane that can serve them
//! - Downloading items with retries on the lane they were assigned

use crate::config::ProxyLane;
use crate::crawler::context::CrawlContext;
use crate::crawler::fetcher::{ClientOptions, Fetcher};
use crate::crawler::retry::{classify, Decision};
use crate::state::Phase;
use crate::storage::{Claim, Outcome, StateStore};
use crate::url::MirrorRule;
use crate::HttpeatError;
use std::cmp::Ordering as CmpOrdering;
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// One egress path, optionally rewriting URLs onto a mirror
#[derive(Debug)]
pub struct Lane {
    name: String,
    fetcher: Fetcher,
    mirror: Option<MirrorRule>,
    capacity: usize,
    busy: AtomicUsize,
}

impl Lane {
    pub fn new(
        name: impl Into<String>,
        fetcher: Fetcher,
        mirror: Option<MirrorRule>,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher,
            mirror,
            capacity: capacity.max(1),
            busy: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn mirror(&self) -> Option<&MirrorRule> {
        self.mirror.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    pub fn has_capacity(&self) -> bool {
        self.busy() < self.capacity
    }

    /// Returns true when this lane can serve `url`
    ///
    /// Canonical lanes serve anything; mirror lanes only URLs under the
    /// canonical base of their rule.
    pub fn accepts(&self, url: &Url) -> bool {
        self.mirror.as_ref().map_or(true, |rule| rule.applies_to(url))
    }

    /// The URL this lane actually requests for `url`
    pub fn fetch_url(&self, url: &Url) -> Url {
        self.mirror
            .as_ref()
            .and_then(|rule| rule.rewrite(url))
            .unwrap_or_else(|| url.clone())
    }

    /// Compares the busy/capacity ratio of two lanes
    fn cmp_load(&self, other: &Self) -> CmpOrdering {
        (self.busy() * other.capacity).cmp(&(other.busy() * self.capacity))
    }
}

/// Builds the lanes of a run
///
/// Every egress path (each proxy in order, or one direct path when there is
/// none) gets a canonical lane followed by one lane per mirror rule. All
/// lanes of an egress path share its HTTP client.
///
/// # Arguments
///
/// * `options` - Client options shared by every lane
/// * `proxies` - Configured proxies, in configuration order
/// * `mirrors` - Mirror rules, in configuration order
/// * `tasks_count` - Capacity of a lane without an override
pub fn build_lanes(
    options: &ClientOptions,
    proxies: &[ProxyLane],
    mirrors: &[MirrorRule],
    tasks_count: usize,
) -> Result<Vec<Arc<Lane>>, HttpeatError> {
    let mut egress = Vec::new();
    if proxies.is_empty() {
        egress.push(("direct".to_string(), None, tasks_count));
    }
    for proxy in proxies {
        let name = match proxy.url.port() {
            Some(port) => format!("{}:{}", proxy.url.host_str().unwrap_or_default(), port),
            None => proxy.url.host_str().unwrap_or_default().to_string(),
        };
        egress.push((name, Some(proxy.url.clone()), proxy.workers(tasks_count)));
    }

    let mut lanes = Vec::new();
    for (name, proxy, capacity) in egress {
        let fetcher = Fetcher::new(&options.clone().with_proxy(proxy))?;
        lanes.push(Arc::new(Lane::new(name.clone(), fetcher.clone(), None, capacity)));
        for rule in mirrors {
            lanes.push(Arc::new(Lane::new(
                format!("{} via {}", name, rule.mirror()),
                fetcher.clone(),
                Some(rule.clone()),
                capacity,
            )));
        }
    }

    tracing::debug!(
        "Built {} lanes: {}",
        lanes.len(),
        lanes.iter().map(|l| l.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(lanes)
}

/// Picks the lane for `url`: the least loaded lane with free capacity that
/// accepts it, the earliest one on ties
pub fn pick_lane<'a>(lanes: &'a [Arc<Lane>], url: &Url) -> Option<&'a Arc<Lane>> {
    lanes
        .iter()
        .filter(|lane| lane.has_capacity() && lane.accepts(url))
        .min_by(|a, b| a.cmp_load(b))
}

/// A slot taken on a lane, released on drop
#[derive(Debug)]
pub struct BusyGuard {
    lane: Arc<Lane>,
}

impl BusyGuard {
    fn acquire(lane: &Arc<Lane>) -> Self {
        lane.busy.fetch_add(1, Ordering::AcqRel);
        Self {
            lane: Arc::clone(lane),
        }
    }
}

impl Deref for BusyGuard {
    type Target = Lane;

    fn deref(&self) -> &Lane {
        &self.lane
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.lane.busy.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Drives the pending items of `store` through `work` until the store is
/// sealed and drained, or `stop` turns true
///
/// Items are claimed in discovery order, as long as some lane has room for
/// them, and each runs in its own task holding a slot of its lane. The first
/// task error aborts the remaining tasks, which releases their claims. On
/// stop, running tasks are cancelled and awaited, so their claims are
/// reverted and partial files removed by the time this returns.
pub(crate) async fn dispatch<W, Fut>(
    store: &Arc<StateStore>,
    lanes: &[Arc<Lane>],
    mut stop: watch::Receiver<bool>,
    work: W,
) -> Result<(), HttpeatError>
where
    W: Fn(Claim, BusyGuard) -> Fut,
    Fut: Future<Output = Result<(), HttpeatError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();

    loop {
        if *stop.borrow_and_update() {
            tracing::debug!("Cancelling {} running {} tasks", tasks.len(), store.phase());
            tasks.shutdown().await;
            return Ok(());
        }

        let changed = store.changed();
        tokio::pin!(changed);
        changed.as_mut().enable();

        while let Some(claim) = store.next_pending(|item| {
            lanes
                .iter()
                .any(|lane| lane.has_capacity() && lane.accepts(&item.url))
        }) {
            let Some(lane) = pick_lane(lanes, &claim.item().url) else {
                break;
            };
            tracing::debug!("{} -> lane {}", claim.item().url, lane.name());
            let slot = BusyGuard::acquire(lane);
            tasks.spawn(work(claim, slot));
        }

        if tasks.is_empty() && store.is_sealed() && store.pending_count() == 0 {
            return Ok(());
        }

        tokio::select! {
            Some(joined) = tasks.join_next() => joined??,
            _ = &mut changed => {}
            Ok(()) = stop.changed() => {}
        }
    }
}

/// Dispatches pending downloads over the lanes
pub struct Scheduler {
    ctx: Arc<CrawlContext>,
    lanes: Vec<Arc<Lane>>,
}

impl Scheduler {
    pub fn new(ctx: Arc<CrawlContext>, lanes: Vec<Arc<Lane>>) -> Self {
        Self { ctx, lanes }
    }

    pub fn lanes(&self) -> &[Arc<Lane>] {
        &self.lanes
    }

    /// Downloads every pending item, returning once discovery is over and
    /// the download store is drained
    pub async fn run(&self) -> Result<(), HttpeatError> {
        tracing::info!("Download dispatcher started on {} lanes", self.lanes.len());
        let ctx = Arc::clone(&self.ctx);
        let stop = self.ctx.stop_signal();
        dispatch(&self.ctx.download, &self.lanes, stop, move |claim, lane| {
            download_item(Arc::clone(&ctx), lane, claim)
        })
        .await?;
        tracing::info!("Download dispatcher finished");
        Ok(())
    }
}

/// Downloads one item, retrying on its lane as the retry policy allows
async fn download_item(
    ctx: Arc<CrawlContext>,
    lane: BusyGuard,
    claim: Claim,
) -> Result<(), HttpeatError> {
    let item = claim.item().clone();
    let url = lane.fetch_url(&item.url);
    let store = &ctx.download;
    let mut budget = ctx.retry.budget(Phase::Download);
    let mut size_known = item.size.is_some();
    // Bytes already added to size_completed by earlier attempts
    let mut counted: u64 = 0;

    loop {
        tracing::debug!("Downloading {} via {}", url, lane.name());
        let mut streamed: u64 = 0;
        let result = lane
            .fetcher()
            .download(
                &url,
                &item.local_path,
                |length| {
                    if let (false, Some(length)) = (size_known, length) {
                        store.add_size_total(length);
                        size_known = true;
                    }
                },
                |n| {
                    streamed += n;
                    if streamed > counted {
                        store.add_size_completed(streamed - counted);
                        counted = streamed;
                    }
                },
            )
            .await;

        let error = match result {
            Ok(bytes) => {
                if !size_known {
                    store.add_size_total(bytes);
                }
                tracing::info!("Downloaded {} ({} bytes)", item.url, bytes);
                claim.complete(Outcome::Ok { size: Some(bytes) })?;
                ctx.retry.pause().await;
                return Ok(());
            }
            Err(error) => error,
        };

        match ctx.retry.decide(&mut budget, classify(&error)) {
            Decision::Retry => {
                tracing::debug!("Retrying {} after: {}", url, error);
                ctx.retry.pause().await;
            }
            Decision::GiveUp => {
                ctx.warn(format!("Download failed for {}: {}", url, error));
                claim.complete(Outcome::Error(error.to_string()))?;
                ctx.retry.pause().await;
                return Ok(());
            }
            Decision::Abort => {
                return Err(HttpeatError::DataTree {
                    path: item.local_path,
                    message: error.to_string(),
                });
            }
        }
    }
}

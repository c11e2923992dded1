//! Adaptive source scheduler.
//!
//! Every active source gets its own poll task. After each poll the task
//! adjusts the source's interval from what the poll yielded (only inside the
//! live-hours window) and sleeps for the new interval. A reconciliation loop
//! periodically reloads the source list and starts or stops tasks so that
//! exactly one task runs per configured URL.
//!
//! The authoritative source list, its URL index and the task handles live
//! together behind one mutex. The lock is only taken for short bookkeeping
//! and never held across I/O.

mod interval;

pub use interval::{next_interval, LiveHours, PollOutcome};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::ingest::Pipeline;
use crate::output::OutputRouter;
use crate::source::{normalize_sources, Source, SourceStore};
use crate::{PollerError, Result};

/// Default period of the reconciliation loop (10 minutes).
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(600);

/// Scheduler tunables.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub live_hours: LiveHours,
    pub reconcile_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            live_hours: LiveHours::always(),
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

struct TimerHandle {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    sources: Vec<Source>,
    index: HashMap<String, usize>,
    timers: HashMap<String, TimerHandle>,
    next_generation: u64,
}

impl State {
    fn source(&self, url: &str) -> Option<&Source> {
        self.index.get(url).and_then(|&i| self.sources.get(i))
    }

    fn replace_sources(&mut self, sources: Vec<Source>) {
        let mut kept = Vec::with_capacity(sources.len());
        let mut index = HashMap::with_capacity(sources.len());
        for source in sources {
            if index.contains_key(&source.url) {
                warn!("Duplicate source URL {} ignored", source.url);
                continue;
            }
            index.insert(source.url.clone(), kept.len());
            kept.push(source);
        }
        self.sources = kept;
        self.index = index;
    }

    fn set_interval(&mut self, url: &str, id: i64, secs: i64) -> bool {
        let Some(&i) = self.index.get(url) else {
            return false;
        };
        match self.sources.get_mut(i) {
            Some(source) if source.id == id => {
                source.update_interval = secs;
                true
            }
            _ => false,
        }
    }

    fn stop_timer(&mut self, url: &str) -> bool {
        match self.timers.remove(url) {
            Some(timer) => {
                timer.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

struct Inner {
    store: Arc<dyn SourceStore>,
    pipeline: Arc<Pipeline>,
    router: OutputRouter,
    options: SchedulerOptions,
    state: Mutex<State>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Owns the per-source poll tasks.
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SourceStore>,
        pipeline: Arc<Pipeline>,
        router: OutputRouter,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                pipeline,
                router,
                options,
                state: Mutex::new(State::default()),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Load the sources, start a task per source and the reconciliation loop.
    ///
    /// Fails when the store cannot be read or holds no sources.
    pub async fn start(&self) -> Result<usize> {
        let sources = self.load_sources().await?;
        if sources.is_empty() {
            return Err(PollerError::Config("no sources configured".to_string()));
        }
        let count = sources.len();
        self.inner.install(sources);

        let inner = Arc::clone(&self.inner);
        self.inner
            .tracker
            .spawn(inner.reconcile_loop().instrument(info_span!("reconcile")));

        info!("Scheduler started with {} source(s)", count);
        Ok(count)
    }

    /// Poll every source once without starting timers.
    ///
    /// Returns the number of items routed.
    pub async fn poll_once(&self) -> Result<usize> {
        let sources = self.load_sources().await?;
        if sources.is_empty() {
            return Err(PollerError::Config("no sources configured".to_string()));
        }
        self.inner.lock().replace_sources(sources.clone());

        let polls = sources.iter().map(|source| self.inner.poll(source));
        let routed: usize = futures::future::join_all(polls).await.into_iter().sum();
        Ok(routed)
    }

    /// Reload the source list and start or stop tasks to match it.
    ///
    /// On a store failure the current set is kept and the error returned.
    pub async fn reconcile(&self) -> Result<()> {
        self.inner.reconcile().await
    }

    /// Add a source and start its task. Returns `false` when its URL is
    /// already active or the scheduler is shutting down.
    ///
    /// An out-of-range interval is reset and the correction persisted.
    pub fn add_source(&self, source: Source) -> bool {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return false;
        }
        let mut state = inner.lock();
        if state.index.contains_key(&source.url) {
            return false;
        }
        let Some(source) = normalize_sources(&inner.store, vec![source], &inner.tracker).pop()
        else {
            return false;
        };
        let url = source.url.clone();
        let mut sources = state.sources.clone();
        sources.push(source);
        state.replace_sources(sources);
        inner.start_timer(&mut state, &url);
        true
    }

    /// Stop a source's task and forget the source.
    ///
    /// A poll already in flight completes and delivers its items.
    pub fn remove_source(&self, url: &str) -> bool {
        let mut state = self.inner.lock();
        let stopped = state.stop_timer(url);
        if state.index.contains_key(url) {
            let sources = state
                .sources
                .iter()
                .filter(|s| s.url != url)
                .cloned()
                .collect();
            state.replace_sources(sources);
            return true;
        }
        stopped
    }

    /// URLs with a running task, sorted.
    pub fn active_urls(&self) -> Vec<String> {
        let state = self.inner.lock();
        let mut urls: Vec<String> = state
            .timers
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// Current state of a source.
    pub fn source(&self, url: &str) -> Option<Source> {
        self.inner.lock().source(url).cloned()
    }

    /// Identity of the task currently serving `url`.
    ///
    /// Changes whenever the task is replaced.
    pub fn timer_generation(&self, url: &str) -> Option<u64> {
        self.inner.lock().timers.get(url).map(|t| t.generation)
    }

    /// Stop scheduling and wait for in-flight polls and writes to finish.
    pub async fn shutdown(&self) {
        info!("Scheduler shutting down");
        self.inner.cancel.cancel();
        self.inner.lock().timers.clear();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Scheduler stopped");
    }

    async fn load_sources(&self) -> Result<Vec<Source>> {
        let sources = self.inner.store.get_sources().await?;
        Ok(normalize_sources(
            &self.inner.store,
            sources,
            &self.inner.tracker,
        ))
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `sources` the authoritative list and align tasks with it.
    ///
    /// Sources that keep their task also keep their in-memory interval, which
    /// may be ahead of the store.
    fn install(self: &Arc<Self>, sources: Vec<Source>) {
        let mut state = self.lock();
        let sources: Vec<Source> = sources
            .into_iter()
            .map(|mut source| {
                if state.timers.contains_key(&source.url) {
                    if let Some(current) =
                        state.source(&source.url).filter(|c| c.id == source.id)
                    {
                        source.update_interval = current.update_interval;
                    }
                }
                source
            })
            .collect();
        state.replace_sources(sources);

        let vanished: Vec<String> = state
            .timers
            .keys()
            .filter(|url| !state.index.contains_key(*url))
            .cloned()
            .collect();
        for url in &vanished {
            state.stop_timer(url);
            info!("Stopped polling {}", url);
        }

        if self.cancel.is_cancelled() {
            return;
        }
        let missing: Vec<String> = state
            .sources
            .iter()
            .map(|s| s.url.clone())
            .filter(|url| !state.timers.contains_key(url))
            .collect();
        for url in &missing {
            self.start_timer(&mut state, url);
        }
    }

    fn start_timer(self: &Arc<Self>, state: &mut State, url: &str) {
        let generation = state.next_generation;
        state.next_generation += 1;

        let cancel = self.cancel.child_token();
        let inner = Arc::clone(self);
        let task_url = url.to_string();
        let task_cancel = cancel.clone();
        let handle = self.tracker.spawn(
            async move { inner.run_source(task_url, task_cancel).await }
                .instrument(info_span!("source", url = %url)),
        );

        debug!("Started polling {}", url);
        state.timers.insert(
            url.to_string(),
            TimerHandle {
                generation,
                cancel,
                handle,
            },
        );
    }

    async fn reconcile(self: &Arc<Self>) -> Result<()> {
        let sources = match self.store.get_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                error!("Failed to reload sources, keeping current set: {}", e);
                return Err(e);
            }
        };
        let sources = normalize_sources(&self.store, sources, &self.tracker);
        debug!("Reconciling {} source(s)", sources.len());
        self.install(sources);
        Ok(())
    }

    async fn reconcile_loop(self: Arc<Self>) {
        let mut ticker = time::interval(self.options.reconcile_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; sources were just loaded.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.reconcile().await;
                    self.pipeline.purge_cache().await;
                }
            }
        }
        debug!("Reconciliation loop stopped");
    }

    /// Poll loop of one source: poll immediately, then once per interval.
    async fn run_source(self: Arc<Self>, url: String, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let snapshot = self.lock().source(&url).cloned();
            let Some(source) = snapshot else {
                break;
            };

            self.poll(&source).await;

            let interval = self
                .lock()
                .source(&url)
                .map(Source::interval)
                .unwrap_or_else(|| source.interval());
            debug!("Next poll of {} in {}s", url, interval.as_secs());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = time::sleep(interval) => {}
            }
        }
        debug!("Stopped poll task for {}", url);
    }

    /// Poll a source once, route its items and adapt its interval.
    ///
    /// Returns the number of items routed.
    async fn poll(self: &Arc<Self>, source: &Source) -> usize {
        let now = Utc::now();
        let result = self.pipeline.parse(source).await;
        let outcome = PollOutcome::from_result(&result);
        if result.is_ok() {
            self.record_last_read(source.id);
        }

        let mut routed = 0;
        match result {
            Ok(items) => {
                if !items.is_empty() {
                    info!(source_id = source.id, "{} new item(s) from {}", items.len(), source.url);
                }
                for item in items {
                    if let Err(e) = self.router.route(item).await {
                        error!("Dropping items of {}: {}", source.url, e);
                        break;
                    }
                    routed += 1;
                }
            }
            Err(e) => warn!(source_id = source.id, "Failed to poll {}: {}", source.url, e),
        }

        if self.options.live_hours.is_open(now) {
            self.adapt_interval(source, outcome);
        }
        routed
    }

    /// Persist the completion time of a successful poll in the background.
    fn record_last_read(&self, id: i64) {
        let store = Arc::clone(&self.store);
        let at = Utc::now();
        self.tracker.spawn(async move {
            if let Err(e) = store.set_last_read(id, at).await {
                warn!("Failed to record last read of source {}: {}", id, e);
            }
        });
    }

    fn adapt_interval(self: &Arc<Self>, source: &Source, outcome: PollOutcome) {
        let next = next_interval(source.update_interval, outcome);
        if next == source.update_interval {
            return;
        }
        if !self.lock().set_interval(&source.url, source.id, next) {
            return;
        }

        debug!(
            source_id = source.id,
            "Interval of {} changed {}s -> {}s",
            source.url,
            source.update_interval,
            next
        );
        let store = Arc::clone(&self.store);
        let id = source.id;
        self.tracker.spawn(async move {
            if let Err(e) = store.change_update_interval(id, next).await {
                error!("Failed to persist interval of source {}: {}", id, e);
            }
        });
    }
}

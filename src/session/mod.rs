//! Session control.
//!
//! A session wires raw sources through their adapters into one gesture
//! pipeline and hands classified gestures to the dispatch queue. Each source
//! runs on a pump thread that pulls raw input, adapts it and publishes
//! [`SessionMessage`]s into a single channel. The event loop itself is
//! single-threaded: it waits on that channel for at most the poll interval
//! (or until the next classifier deadline), then polls the pipeline for
//! threshold crossings.
//!
//! Every exit path releases the sources: pump threads are joined (dropping
//! their sources) and the dispatch queue is cancelled.

pub mod replay;
pub mod source;

pub use source::{ChannelSource, LineSource, RawSource, ReportSource, SourceError};

use crate::adapters::Adapter;
use crate::classifier::GesturePipeline;
use crate::dispatch::{ActionCatalog, DispatchOutcome, DispatchQueue, DispatchResult, Dispatcher};
use crate::models::{CanonicalEdge, GestureEvent, MappingConfig};
use anyhow::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// Time running dispatches get to finish when the session stops.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Message published by a source pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    /// A canonical edge
    Edge(CanonicalEdge),
    /// Adapter diagnostic for malformed or ignored input
    Note {
        /// Source name
        source: String,
        /// Diagnostic text
        note: String,
    },
    /// The source stopped producing input
    SourceLost {
        /// Source name
        source: String,
        /// Why it stopped
        reason: String,
    },
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Stop was requested
    Stopped,
    /// Every source was lost; the last one is named
    SourceLost {
        /// Source name
        source: String,
        /// Why it stopped
        reason: String,
    },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::SourceLost { source, reason } => {
                write!(f, "stopped, reason: source lost ({source}: {reason})")
            }
        }
    }
}

/// Lifecycle of a [`SessionController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not started yet
    Idle,
    /// Event loop running
    Running,
    /// Finished
    Stopped(StopReason),
}

/// Counters reported when a session stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Canonical edges received
    pub edges: u64,
    /// Adapter notes received
    pub notes: u64,
    /// Gestures classified
    pub gestures: u64,
    /// Duplicate presses and stray releases
    pub anomalies: u64,
    /// Dispatch results collected
    pub dispatched: u64,
    /// Dispatches that ran an action
    pub executed: u64,
    /// Dispatches that resolved to nothing
    pub skipped: u64,
    /// Dispatches whose executor failed
    pub failed: u64,
    /// Jobs dropped because a dispatch lane was full
    pub dropped: u64,
    /// Jobs discarded at shutdown
    pub cancelled: u64,
}

impl SessionStats {
    fn record(&mut self, result: &DispatchResult) {
        self.dispatched += 1;
        match result.outcome {
            DispatchOutcome::Executed => self.executed += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
            DispatchOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edges={} gestures={} anomalies={} dispatched={} executed={} skipped={} failed={} dropped={} cancelled={}",
            self.edges,
            self.gestures,
            self.anomalies,
            self.dispatched,
            self.executed,
            self.skipped,
            self.failed,
            self.dropped,
            self.cancelled
        )
    }
}

/// Cloneable handle that asks a running session to stop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests a stop; the loop notices within one poll interval.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type ResultCallback = Box<dyn FnMut(&DispatchResult) + Send>;

/// Runs sources through classification and dispatch until stopped.
pub struct SessionController {
    dispatcher: Arc<Dispatcher>,
    sources: Vec<(Box<dyn RawSource>, Adapter)>,
    stop: StopHandle,
    state: SessionState,
    stats: SessionStats,
    on_result: Option<ResultCallback>,
    config_watch: Option<Duration>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("sources", &self.sources.len())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Creates an idle session dispatching through `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            sources: Vec::new(),
            stop: StopHandle::default(),
            state: SessionState::Idle,
            stats: SessionStats::default(),
            on_result: None,
            config_watch: None,
        }
    }

    /// Attaches a source and the adapter that decodes it.
    pub fn add_source(&mut self, source: Box<dyn RawSource>, adapter: Adapter) {
        self.sources.push((source, adapter));
    }

    /// Calls `callback` for every dispatch result as it is collected.
    pub fn on_result<F>(&mut self, callback: F)
    where
        F: FnMut(&DispatchResult) + Send + 'static,
    {
        self.on_result = Some(Box::new(callback));
    }

    /// Re-reads the configuration file when it changes, checking every `interval`.
    pub fn watch_config(&mut self, interval: Duration) {
        self.config_watch = Some(interval);
    }

    /// Handle for stopping the session from another thread or a signal handler.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Counters so far (final once the session has stopped).
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Runs the event loop until a stop is requested or every source is lost.
    pub fn run(&mut self) -> Result<StopReason> {
        if self.state != SessionState::Idle {
            anyhow::bail!("Session already ran");
        }
        if self.sources.is_empty() {
            anyhow::bail!("No input sources configured");
        }

        let store = Arc::clone(self.dispatcher.store());
        let mut config = store.snapshot();
        for warning in ActionCatalog::builtin().validate(&config) {
            tracing::warn!("Config: {warning}");
        }

        let mut pipeline = GesturePipeline::from_settings(&config.settings);
        let mut poll_interval = config.settings.poll_interval();
        let mut queue = DispatchQueue::start(
            Arc::clone(&self.dispatcher),
            config.settings.dispatch_workers,
            config.settings.dispatch_queue_capacity,
        );

        let (tx, messages) = mpsc::channel();
        let sources = std::mem::take(&mut self.sources);
        let mut alive = sources.len();
        let pumps = Pumps::start(sources, &tx, &self.stop, poll_interval);
        drop(tx);

        self.state = SessionState::Running;
        tracing::info!("Session started with {alive} source(s)");

        let mut watcher = self
            .config_watch
            .map(|interval| ConfigWatch::new(interval, store.file_modified()));
        let mut reason = StopReason::Stopped;

        while !self.stop.is_stopped() {
            let now = Instant::now();
            let wait = pipeline
                .next_deadline()
                .map_or(poll_interval, |deadline| {
                    deadline.saturating_duration_since(now).min(poll_interval)
                });

            match messages.recv_timeout(wait) {
                Ok(SessionMessage::Edge(edge)) => {
                    self.stats.edges += 1;
                    tracing::debug!("{edge}");
                    let events = pipeline.handle_edge(&edge);
                    self.submit(&mut queue, events);
                }
                Ok(SessionMessage::Note { source, note }) => {
                    self.stats.notes += 1;
                    tracing::debug!("{source}: {note}");
                }
                Ok(SessionMessage::SourceLost { source, reason: why }) => {
                    tracing::error!("Source '{source}' lost: {why}");
                    alive = alive.saturating_sub(1);
                    if alive == 0 {
                        reason = StopReason::SourceLost {
                            source,
                            reason: why,
                        };
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let due = pipeline.poll(Instant::now());
            self.submit(&mut queue, due);

            if let Some(watcher) = &mut watcher {
                if watcher.changed(store.file_modified()) {
                    store.reload();
                }
            }
            let latest = store.snapshot();
            if !Arc::ptr_eq(&latest, &config) {
                let flushed = self.apply_config(&mut pipeline, &latest);
                self.submit(&mut queue, flushed);
                poll_interval = latest.settings.poll_interval();
                config = latest;
            }

            for result in queue.drain_results() {
                self.collect(&result);
            }
        }

        self.stop.stop();
        drop(pumps);

        let pending = pipeline.finish();
        if !pending.is_empty() {
            tracing::debug!("Discarding {} pending gesture(s)", pending.len());
        }
        self.stats.anomalies = pipeline.classifier().anomalies();
        self.stats.dropped = queue.dropped();

        let report = queue.shutdown(SHUTDOWN_GRACE);
        for result in &report.results {
            self.collect(result);
        }
        self.stats.cancelled = report.cancelled;

        tracing::info!("Session {reason}: {}", self.stats);
        self.state = SessionState::Stopped(reason.clone());
        Ok(reason)
    }

    fn submit(&mut self, queue: &mut DispatchQueue, events: Vec<GestureEvent>) {
        for event in events {
            self.stats.gestures += 1;
            tracing::debug!("Gesture: {event}");
            queue.enqueue(event);
        }
    }

    fn collect(&mut self, result: &DispatchResult) {
        self.stats.record(result);
        if let Some(callback) = &mut self.on_result {
            callback(result);
        }
    }

    fn apply_config(
        &self,
        pipeline: &mut GesturePipeline,
        config: &MappingConfig,
    ) -> Vec<GestureEvent> {
        tracing::info!("Applying updated configuration");
        for warning in ActionCatalog::builtin().validate(config) {
            tracing::warn!("Config: {warning}");
        }
        pipeline.apply_settings(&config.settings)
    }
}

/// Rate-limited check of the configuration file's modification time.
#[derive(Debug)]
struct ConfigWatch {
    interval: Duration,
    last_check: Instant,
    last_seen: Option<SystemTime>,
}

impl ConfigWatch {
    fn new(interval: Duration, modified: Option<SystemTime>) -> Self {
        Self {
            interval,
            last_check: Instant::now(),
            last_seen: modified,
        }
    }

    fn changed(&mut self, modified: Option<SystemTime>) -> bool {
        if self.last_check.elapsed() < self.interval {
            return false;
        }
        self.last_check = Instant::now();
        if modified == self.last_seen {
            return false;
        }
        self.last_seen = modified;
        modified.is_some()
    }
}

/// Source pump threads; stopping joins them, which drops their sources.
struct Pumps {
    stop: StopHandle,
    handles: Vec<JoinHandle<()>>,
}

impl Pumps {
    fn start(
        sources: Vec<(Box<dyn RawSource>, Adapter)>,
        tx: &Sender<SessionMessage>,
        stop: &StopHandle,
        poll_interval: Duration,
    ) -> Self {
        let handles = sources
            .into_iter()
            .map(|(source, adapter)| {
                let tx = tx.clone();
                let stop = stop.clone();
                thread::spawn(move || pump(source, adapter, &tx, &stop, poll_interval))
            })
            .collect();
        Self {
            stop: stop.clone(),
            handles,
        }
    }
}

impl Drop for Pumps {
    fn drop(&mut self) {
        self.stop.stop();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Source pump panicked");
            }
        }
    }
}

fn pump(
    mut source: Box<dyn RawSource>,
    mut adapter: Adapter,
    tx: &Sender<SessionMessage>,
    stop: &StopHandle,
    poll_interval: Duration,
) {
    let name = source.name().to_string();
    while !stop.is_stopped() {
        match source.next(poll_interval) {
            Ok(Some(input)) => {
                let outcome = adapter.adapt(&input, Instant::now());
                if let Some(note) = outcome.note {
                    let message = SessionMessage::Note {
                        source: name.clone(),
                        note,
                    };
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                for edge in outcome.edges {
                    if tx.send(SessionMessage::Edge(edge)).is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                let _ = tx.send(SessionMessage::SourceLost {
                    source: name,
                    reason: err.to_string(),
                });
                return;
            }
        }
    }
    tracing::debug!("Pump for '{name}' stopped");
}

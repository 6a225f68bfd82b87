//! Bounded background dispatch.
//!
//! Jobs are spread over a fixed number of lanes, each a bounded channel with
//! one worker thread. A button always maps to the same lane, so its
//! dispatches run in classification order while other buttons proceed in
//! parallel. Enqueueing never blocks: a full lane drops the job.

use crate::dispatch::{DispatchResult, Dispatcher};
use crate::models::{ButtonId, GestureEvent};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Summary returned by [`DispatchQueue::shutdown`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Results that completed but had not been collected yet
    pub results: Vec<DispatchResult>,
    /// Jobs discarded without running
    pub cancelled: u64,
    /// Workers still busy in an executor call when the grace period ended
    pub abandoned_workers: usize,
}

/// Worker lanes running dispatches off the event loop.
pub struct DispatchQueue {
    lanes: Vec<SyncSender<GestureEvent>>,
    workers: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
    results: Receiver<DispatchResult>,
    dropped: u64,
}

impl DispatchQueue {
    /// Starts `lanes` workers, each accepting up to `capacity` queued jobs.
    #[must_use]
    pub fn start(dispatcher: Arc<Dispatcher>, lanes: usize, capacity: usize) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let skipped = Arc::new(AtomicU64::new(0));
        let (result_tx, results) = mpsc::channel();

        let mut senders = Vec::new();
        let mut workers = Vec::new();
        for lane in 0..lanes.max(1) {
            let (tx, rx) = mpsc::sync_channel::<GestureEvent>(capacity.max(1));
            senders.push(tx);
            workers.push(spawn_worker(
                lane,
                rx,
                Arc::clone(&dispatcher),
                result_tx.clone(),
                Arc::clone(&cancelled),
                Arc::clone(&skipped),
            ));
        }

        Self {
            lanes: senders,
            workers,
            cancelled,
            skipped,
            results,
            dropped: 0,
        }
    }

    fn lane_for(&self, button: &ButtonId) -> usize {
        let mut hasher = DefaultHasher::new();
        button.hash(&mut hasher);
        (hasher.finish() % self.lanes.len() as u64) as usize
    }

    /// Queues a dispatch. Returns false if the job was dropped.
    pub fn enqueue(&mut self, event: GestureEvent) -> bool {
        let lane = self.lane_for(&event.button_id);
        match self.lanes[lane].try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped += 1;
                tracing::warn!("Dispatch lane {lane} is full, dropping {event}");
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                self.dropped += 1;
                tracing::warn!("Dispatch lane {lane} is gone, dropping {event}");
                false
            }
        }
    }

    /// Jobs dropped because their lane was full.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Collects every result that is ready, without waiting.
    pub fn drain_results(&self) -> Vec<DispatchResult> {
        self.results.try_iter().collect()
    }

    /// Waits up to `timeout` for the next result.
    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<DispatchResult> {
        self.results.recv_timeout(timeout).ok()
    }

    /// Cancels queued jobs and stops the workers.
    ///
    /// Jobs not yet started are discarded. A worker inside an executor call is
    /// given `grace` to finish; after that it is left to exit on its own.
    pub fn shutdown(self, grace: Duration) -> ShutdownReport {
        self.cancelled.store(true, Ordering::SeqCst);
        drop(self.lanes);

        let deadline = Instant::now() + grace;
        let mut pending = self.workers;
        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(JoinHandle::is_finished);
            for handle in finished {
                if handle.join().is_err() {
                    tracing::warn!("Dispatch worker panicked");
                }
            }
            pending = running;
            if pending.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        if !pending.is_empty() {
            tracing::warn!(
                "{} dispatch worker(s) still busy after {}ms, detaching",
                pending.len(),
                grace.as_millis()
            );
        }

        ShutdownReport {
            results: self.results.try_iter().collect(),
            cancelled: self.skipped.load(Ordering::SeqCst),
            abandoned_workers: pending.len(),
        }
    }
}

fn spawn_worker(
    lane: usize,
    jobs: Receiver<GestureEvent>,
    dispatcher: Arc<Dispatcher>,
    results: Sender<DispatchResult>,
    cancelled: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in jobs {
            if cancelled.load(Ordering::SeqCst) {
                skipped.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            let result = dispatcher.dispatch_current(&event);
            if results.send(result).is_err() {
                break;
            }
        }
        tracing::debug!("Dispatch lane {lane} stopped");
    })
}

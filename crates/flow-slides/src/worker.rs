//! Background conversion worker and its single-slot task queue.
//!
//! The queue holds at most one pending task: enqueueing supersedes whatever
//! has not started yet and cancels the task in flight. Cancellation is
//! cooperative; a running task notices it between slides (or files) by
//! comparing its generation with the queue's.
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::convert::ConverterEngine;
use crate::error::{Result, SlideError};

/// How long an idle worker blocks on the queue before rechecking its stop flag.
pub const POP_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Convert and cache every slide of one deck.
    Render { deck: PathBuf },
    /// Read slide counts of many decks without rendering.
    Scan { decks: Vec<(String, PathBuf)> },
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Render { .. } => "render",
            Task::Scan { .. } => "scan",
        }
    }
}

/// Reports from the worker. Every event carries the generation of the task
/// that produced it so receivers can drop reports of superseded tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Status {
        generation: u64,
        message: String,
    },
    Progress {
        generation: u64,
        current: usize,
        total: usize,
        engine: String,
    },
    RenderFinished {
        generation: u64,
        deck: PathBuf,
        count: usize,
    },
    ScanFinished {
        generation: u64,
        counts: Vec<(String, usize)>,
    },
    Failed {
        generation: u64,
        message: String,
    },
}

impl WorkerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            WorkerEvent::Status { generation, .. }
            | WorkerEvent::Progress { generation, .. }
            | WorkerEvent::RenderFinished { generation, .. }
            | WorkerEvent::ScanFinished { generation, .. }
            | WorkerEvent::Failed { generation, .. } => *generation,
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(u64, Task)>,
}

/// Last-wins task queue shared by the manager and its workers.
#[derive(Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    /// Bumped under the state lock; read lock-free by running tasks.
    generation: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the running task, drop unstarted ones and queue `task`.
    /// Returns the generation assigned to it.
    pub fn enqueue(&self, task: Task) -> u64 {
        let mut state = self.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let dropped = state.pending.len();
        state.pending.clear();
        debug!(generation, kind = task.kind(), dropped, "task queued");
        state.pending.push_back((generation, task));
        self.ready.notify_all();
        generation
    }

    /// Cancel the running task and drop unstarted ones.
    pub fn abort_current(&self) {
        let mut state = self.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.pending.clear();
    }

    /// Wait up to `timeout` for a task.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<(u64, Task)> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(entry) = state.pending.pop_front() {
                return Some(entry);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            state = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a task of `generation` has not been superseded or aborted.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn pending_kinds(&self) -> Vec<&'static str> {
        self.lock().pending.iter().map(|(_, t)| t.kind()).collect()
    }
}

/// One background thread draining a [`TaskQueue`].
pub struct Worker {
    id: usize,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn(
        id: usize,
        queue: Arc<TaskQueue>,
        engine: Arc<dyn ConverterEngine>,
        events: Sender<WorkerEvent>,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_loop = WorkerLoop {
            queue,
            engine,
            events,
            stop: Arc::clone(&stop),
        };
        let handle = thread::Builder::new()
            .name(format!("slide-worker-{id}"))
            .spawn(move || worker_loop.run())
            .map_err(|e| SlideError::Worker(e.to_string()))?;
        debug!(worker = id, "worker spawned");
        Ok(Self { id, stop, handle })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Ask the worker to exit after its current slide.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait up to `timeout` for the thread to exit. A worker still stuck in a
    /// conversion is handed back.
    pub fn join_timeout(self, timeout: Duration) -> std::result::Result<(), Worker> {
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                return Err(self);
            }
            thread::sleep(Duration::from_millis(10));
        }
        let id = self.id;
        if self.handle.join().is_err() {
            error!(worker = id, "worker thread panicked");
        }
        Ok(())
    }
}

/// Workers that were replaced but may still be finishing a conversion.
#[derive(Default)]
pub struct Retiring {
    workers: Vec<Worker>,
}

impl Retiring {
    pub fn push(&mut self, worker: Worker) {
        worker.request_stop();
        self.workers.push(worker);
    }

    /// Reap workers whose threads have exited.
    pub fn prune(&mut self) {
        let (done, mut running): (Vec<_>, Vec<_>) =
            self.workers.drain(..).partition(Worker::is_finished);
        for worker in done {
            if let Err(worker) = worker.join_timeout(Duration::ZERO) {
                debug!(worker = worker.id(), "worker not joinable yet");
                running.push(worker);
            }
        }
        self.workers = running;
    }

    /// Join every worker, waiting at most `timeout` in total. Returns how
    /// many are still running.
    pub fn join_all(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut still_running = Vec::new();
        for worker in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Err(worker) = worker.join_timeout(remaining) {
                warn!(worker = worker.id(), "worker did not stop in time");
                still_running.push(worker);
            }
        }
        self.workers = still_running;
        self.workers.len()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

struct WorkerLoop {
    queue: Arc<TaskQueue>,
    engine: Arc<dyn ConverterEngine>,
    events: Sender<WorkerEvent>,
    stop: Arc<AtomicBool>,
}

impl WorkerLoop {
    fn run(self) {
        while !self.stop.load(Ordering::SeqCst) {
            let Some((generation, task)) = self.queue.pop_timeout(POP_TIMEOUT) else {
                continue;
            };
            let kind = task.kind();
            if self.cancelled(generation) {
                debug!(generation, kind, "task superseded before start");
                continue;
            }

            let result = match task {
                Task::Render { deck } => self.render(generation, deck),
                Task::Scan { decks } => self.scan(generation, decks),
            };
            match result {
                Ok(Some(event)) => self.emit(event),
                Ok(None) => debug!(generation, kind, "task cancelled"),
                Err(err) if self.cancelled(generation) => {
                    debug!(generation, kind, "task cancelled: {err}");
                }
                Err(err) => {
                    error!(generation, kind, engine = self.engine.name(), "task failed: {err}");
                    self.emit(WorkerEvent::Failed {
                        generation,
                        message: err.to_string(),
                    });
                }
            }
        }
        debug!("worker stopped");
    }

    fn cancelled(&self, generation: u64) -> bool {
        self.stop.load(Ordering::SeqCst) || !self.queue.is_current(generation)
    }

    fn emit(&self, event: WorkerEvent) {
        // The receiver is gone only while the manager shuts down.
        let _ = self.events.send(event);
    }

    fn render(&self, generation: u64, deck: PathBuf) -> Result<Option<WorkerEvent>> {
        let name = deck
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.emit(WorkerEvent::Status {
            generation,
            message: format!("Converting {name}"),
        });

        let mut total = match self.engine.slide_count(&deck) {
            Ok(count) => count,
            // Formats we cannot count from the container are counted from
            // the converted pages.
            Err(SlideError::UnsupportedFormat(_)) => match self.engine.ensure_cached(&deck, 0) {
                Ok(_) => self.engine.slide_count(&deck)?,
                Err(err) => {
                    self.conversion_failed(generation, &deck, &err);
                    0
                }
            },
            Err(err) if err.is_input_error() => {
                warn!(deck = %deck.display(), "{err}");
                0
            }
            Err(err) => return Err(err),
        };

        let engine = self.engine.name().to_string();
        info!(deck = %deck.display(), total, engine = %engine, "rendering deck");
        let mut index = 0;
        while index < total {
            if self.cancelled(generation) {
                return Ok(None);
            }
            match self.engine.ensure_cached(&deck, index) {
                Ok(_) => {}
                Err(err @ SlideError::MissingOutput { .. }) => {
                    warn!(deck = %deck.display(), index, "{err}");
                }
                // The deck converts as a whole. Missing slides are served as
                // placeholders on demand.
                Err(err) => {
                    if self.cancelled(generation) {
                        return Ok(None);
                    }
                    self.conversion_failed(generation, &deck, &err);
                    break;
                }
            }
            if index == 0 {
                // The rasterized page count is authoritative once it exists.
                total = self.engine.slide_count(&deck).unwrap_or(total);
            }
            index += 1;
            self.emit(WorkerEvent::Progress {
                generation,
                current: index,
                total,
                engine: engine.clone(),
            });
        }

        if self.cancelled(generation) {
            return Ok(None);
        }
        Ok(Some(WorkerEvent::RenderFinished {
            generation,
            deck,
            count: total,
        }))
    }

    fn conversion_failed(&self, generation: u64, deck: &Path, err: &SlideError) {
        error!(deck = %deck.display(), engine = self.engine.name(), "conversion failed: {err}");
        self.emit(WorkerEvent::Status {
            generation,
            message: format!("Conversion failed: {err}"),
        });
    }

    fn scan(&self, generation: u64, decks: Vec<(String, PathBuf)>) -> Result<Option<WorkerEvent>> {
        self.emit(WorkerEvent::Status {
            generation,
            message: format!("Reading slide counts of {} decks", decks.len()),
        });

        let mut counts = Vec::with_capacity(decks.len());
        for (name, path) in decks {
            if self.cancelled(generation) {
                return Ok(None);
            }
            let count = self.engine.slide_count(&path).unwrap_or_else(|err| {
                warn!(song = %name, deck = %path.display(), "slide count unavailable: {err}");
                0
            });
            counts.push((name, count));
        }
        Ok(Some(WorkerEvent::ScanFinished { generation, counts }))
    }
}

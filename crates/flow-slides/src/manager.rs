//! Owns the conversion worker and answers slide queries for the UI thread.
//!
//! All state lives in [`SlideManager`] and is only changed by its own methods
//! on the caller's thread. The worker reports back through a channel which
//! the caller drains with [`SlideManager::process_events`] (or
//! [`SlideManager::wait_events`]); the manager turns those reports into
//! [`ManagerEvent`]s on the sender it was created with.
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::convert::{ConverterEngine, SlideImage};
use crate::error::{Result, SlideError};
use crate::index::SlideIndexSpace;
use crate::live::SlideSource;
use crate::model::Song;
use crate::watch::FileWatch;
use crate::worker::{Retiring, Task, TaskQueue, Worker, WorkerEvent};

/// How long a replaced worker gets to finish its slide before it is moved to
/// the retiring list.
const REPLACE_WAIT: Duration = Duration::from_millis(200);

/// Bound on waiting for workers during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    LoadStarted,
    LoadFinished(usize),
    LoadError(String),
    LoadProgress {
        current: usize,
        total: usize,
        engine: String,
    },
    LoadStatus(String),
    FileChanged(PathBuf),
    MetadataScanStarted,
    MetadataScanFinished(usize),
}

/// What the task of the current generation is for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Job {
    Deck,
    /// Positions in `songs` of the scanned decks, in scan order, and
    /// whether the decks are rendered once the counts are known.
    Scan { positions: Vec<usize>, render: bool },
    /// One deck of the render chain.
    ChainItem(usize),
}

#[derive(Debug)]
struct Active {
    generation: u64,
    job: Job,
}

pub struct SlideManager {
    engine: Arc<dyn ConverterEngine>,
    queue: Arc<TaskQueue>,
    worker: Option<Worker>,
    retiring: Retiring,
    next_worker_id: usize,
    worker_tx: Sender<WorkerEvent>,
    worker_rx: Receiver<WorkerEvent>,
    watch: FileWatch,
    changes: Receiver<PathBuf>,
    events: Sender<ManagerEvent>,

    /// Single-deck mode, used while no songs are loaded.
    deck: Option<PathBuf>,
    deck_count: usize,

    songs: Vec<Song>,
    index: SlideIndexSpace,
    chain: VecDeque<usize>,
    active: Option<Active>,
}

impl SlideManager {
    pub fn new(engine: Arc<dyn ConverterEngine>, events: Sender<ManagerEvent>) -> Result<Self> {
        let (worker_tx, worker_rx) = mpsc::channel();
        let (change_tx, changes) = mpsc::channel();
        let mut manager = Self {
            engine,
            queue: Arc::new(TaskQueue::new()),
            worker: None,
            retiring: Retiring::default(),
            next_worker_id: 0,
            worker_tx,
            worker_rx,
            watch: FileWatch::new(change_tx),
            changes,
            events,
            deck: None,
            deck_count: 0,
            songs: Vec::new(),
            index: SlideIndexSpace::default(),
            chain: VecDeque::new(),
            active: None,
        };
        manager.spawn_worker()?;
        Ok(manager)
    }

    pub fn engine(&self) -> &Arc<dyn ConverterEngine> {
        &self.engine
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let worker = Worker::spawn(
            self.next_worker_id,
            Arc::clone(&self.queue),
            Arc::clone(&self.engine),
            self.worker_tx.clone(),
        )?;
        self.next_worker_id += 1;
        self.worker = Some(worker);
        Ok(())
    }

    fn emit(&self, event: ManagerEvent) {
        let _ = self.events.send(event);
    }

    fn submit(&mut self, task: Task, job: Job) {
        let generation = self.queue.enqueue(task);
        self.active = Some(Active { generation, job });
    }

    /// Cancel whatever is loading and forget the render chain.
    fn cancel_loads(&mut self) {
        self.chain.clear();
        if self.active.take().is_some() {
            self.queue.abort_current();
        }
    }

    /// Load one deck in single-deck mode. Returns `false` when the same deck
    /// is already loaded with a known slide count.
    pub fn load_deck(&mut self, path: &Path) -> Result<bool> {
        let path = path
            .canonicalize()
            .map_err(|_| SlideError::MissingInput(path.to_path_buf()))?;
        if self.songs.is_empty() && self.deck.as_deref() == Some(path.as_path()) && self.deck_count > 0 {
            debug!(deck = %path.display(), "deck already loaded");
            return Ok(false);
        }

        self.cancel_loads();
        self.songs.clear();
        self.index.recompute(&self.songs);
        self.deck = Some(path.clone());
        self.deck_count = 0;

        info!(deck = %path.display(), "loading deck");
        self.emit(ManagerEvent::LoadStarted);
        self.submit(Task::Render { deck: path }, Job::Deck);
        Ok(true)
    }

    /// Load the decks of several songs: read every slide count first, then
    /// render the decks one after another in song order.
    pub fn load_songs(&mut self, songs: Vec<Song>) {
        self.cancel_loads();
        self.deck = None;
        self.deck_count = 0;
        self.songs = songs;
        self.index.recompute(&self.songs);
        self.start_scan(true);
    }

    /// Like [`load_songs`](Self::load_songs), but only read the slide counts.
    /// Nothing is rendered after the scan.
    pub fn scan_songs(&mut self, songs: Vec<Song>) {
        self.cancel_loads();
        self.deck = None;
        self.deck_count = 0;
        self.songs = songs;
        self.index.recompute(&self.songs);
        self.start_scan(false);
    }

    fn start_scan(&mut self, render: bool) {
        let (positions, decks): (Vec<usize>, Vec<(String, PathBuf)>) = self
            .songs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.has_slides())
            .filter_map(|(pos, s)| Some((pos, (s.name.clone(), s.resolved_deck()?))))
            .unzip();

        info!(songs = self.songs.len(), decks = decks.len(), "scanning slide counts");
        self.emit(ManagerEvent::MetadataScanStarted);
        if decks.is_empty() {
            self.emit(ManagerEvent::MetadataScanFinished(self.index.total()));
            return;
        }
        self.submit(Task::Scan { decks }, Job::Scan { positions, render });
    }

    /// Render one song's deck again, e.g. after it changed on disk.
    pub fn reload_song(&mut self, name: &str) -> Result<()> {
        let pos = self
            .songs
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| SlideError::SongNotFound(name.to_string()))?;
        if !self.songs[pos].has_slides() {
            let deck = self.songs[pos].deck().map(Path::to_path_buf).unwrap_or_default();
            return Err(SlideError::MissingInput(deck));
        }

        // A running scan is never cancelled by a reload.
        if matches!(self.active.as_ref().map(|a| &a.job), Some(Job::Scan { .. })) {
            debug!(song = %name, "reload queued behind slide count scan");
            if !self.chain.contains(&pos) {
                self.chain.push_back(pos);
            }
            return Ok(());
        }

        self.cancel_loads();
        self.chain.push_back(pos);
        self.emit(ManagerEvent::LoadStarted);
        self.advance_chain();
        Ok(())
    }

    /// Drop every cached image and load everything again from scratch.
    pub fn reload_all(&mut self) -> Result<()> {
        self.cancel_loads();
        for deck in self.loaded_decks() {
            if let Err(err) = self.engine.clear_cache(&deck) {
                warn!(deck = %deck.display(), "cache not cleared: {err}");
            }
        }
        self.reset_worker()?;

        if !self.songs.is_empty() {
            self.start_scan(true);
        } else if let Some(deck) = self.deck.clone() {
            self.deck_count = 0;
            self.emit(ManagerEvent::LoadStarted);
            self.submit(Task::Render { deck }, Job::Deck);
        }
        Ok(())
    }

    fn loaded_decks(&self) -> Vec<PathBuf> {
        if self.songs.is_empty() {
            self.deck.iter().cloned().collect()
        } else {
            self.songs.iter().filter_map(Song::resolved_deck).collect()
        }
    }

    /// Replace the worker. The old one is asked to stop and, if it is still
    /// busy converting, kept on the retiring list until it exits.
    pub fn reset_worker(&mut self) -> Result<()> {
        self.queue.abort_current();
        self.active = None;
        if let Some(old) = self.worker.take() {
            old.request_stop();
            if let Err(old) = old.join_timeout(REPLACE_WAIT) {
                debug!(worker = old.id(), "worker still busy, retiring");
                self.retiring.push(old);
            }
        }
        self.retiring.prune();
        self.spawn_worker()
    }

    pub fn start_watching(&mut self, path: &Path) -> Result<()> {
        self.watch.watch(path)
    }

    pub fn stop_watching(&mut self) {
        self.watch.unwatch();
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_watching()
    }

    /// Stop watching, cancel work and wait (bounded) for every worker.
    pub fn shutdown(&mut self) {
        self.watch.unwatch();
        self.cancel_loads();
        self.queue.abort_current();
        if let Some(worker) = self.worker.take() {
            worker.request_stop();
            if let Err(worker) = worker.join_timeout(SHUTDOWN_TIMEOUT) {
                self.retiring.push(worker);
            }
        }
        let stuck = self.retiring.join_all(SHUTDOWN_TIMEOUT);
        if stuck > 0 {
            warn!(stuck, "workers still running at shutdown");
        }
        debug!("slide manager shut down");
    }

    /// Handle every pending worker report and file change. Returns how many
    /// were handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(path) = self.changes.try_recv() {
            self.emit(ManagerEvent::FileChanged(path));
            handled += 1;
        }
        while let Ok(event) = self.worker_rx.try_recv() {
            self.handle_worker_event(event);
            handled += 1;
        }
        handled
    }

    /// Block up to `timeout` for the next worker report, then handle
    /// everything pending.
    pub fn wait_events(&mut self, timeout: Duration) -> usize {
        let mut handled = 0;
        if let Ok(event) = self.worker_rx.recv_timeout(timeout) {
            self.handle_worker_event(event);
            handled += 1;
        }
        handled + self.process_events()
    }

    /// Whether a load or scan is still in progress.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|a| a.generation == event.generation());
        if !is_current {
            debug!(generation = event.generation(), "dropping report of superseded task");
            return;
        }

        match event {
            WorkerEvent::Status { message, .. } => self.emit(ManagerEvent::LoadStatus(message)),
            WorkerEvent::Progress {
                current,
                total,
                engine,
                ..
            } => self.emit(ManagerEvent::LoadProgress {
                current,
                total,
                engine,
            }),
            WorkerEvent::ScanFinished { counts, .. } => self.finish_scan(counts),
            WorkerEvent::RenderFinished { deck, count, .. } => self.finish_render(&deck, count),
            WorkerEvent::Failed { message, .. } => {
                self.emit(ManagerEvent::LoadError(message));
                let in_chain = matches!(
                    self.active.as_ref().map(|a| &a.job),
                    Some(Job::ChainItem(_))
                );
                self.active = None;
                if in_chain {
                    self.advance_chain();
                }
            }
        }
    }

    fn finish_scan(&mut self, counts: Vec<(String, usize)>) {
        let Some(Active {
            job: Job::Scan { positions, render },
            ..
        }) = self.active.take()
        else {
            return;
        };
        for (pos, (name, count)) in positions.iter().zip(counts) {
            if let Some(song) = self.songs.get_mut(*pos) {
                debug!(song = %name, count, "slide count");
                song.set_slide_count(count);
            }
        }
        self.index.recompute(&self.songs);
        self.emit(ManagerEvent::MetadataScanFinished(self.index.total()));

        // Every scanned deck is in `positions`, including any reload that
        // was queued during the scan.
        if render {
            self.chain = positions.into();
        }
        if self.chain.is_empty() {
            return;
        }
        self.emit(ManagerEvent::LoadStarted);
        self.advance_chain();
    }

    fn finish_render(&mut self, deck: &Path, count: usize) {
        let Some(active) = self.active.take() else {
            return;
        };
        match active.job {
            Job::Deck => {
                self.deck_count = count;
                info!(deck = %deck.display(), count, "deck loaded");
                self.emit(ManagerEvent::LoadFinished(count));
            }
            Job::ChainItem(pos) => {
                if let Some(song) = self.songs.get_mut(pos) {
                    if song.slide_count() != count {
                        song.set_slide_count(count);
                        self.index.recompute(&self.songs);
                    }
                }
                self.advance_chain();
            }
            Job::Scan { .. } => {}
        }
    }

    /// Start rendering the next deck of the chain, or report the chain done.
    fn advance_chain(&mut self) {
        while let Some(pos) = self.chain.pop_front() {
            let Some(deck) = self.songs.get(pos).and_then(Song::resolved_deck) else {
                continue;
            };
            self.submit(Task::Render { deck }, Job::ChainItem(pos));
            return;
        }
        info!(total = self.index.total(), "all decks loaded");
        self.emit(ManagerEvent::LoadFinished(self.index.total()));
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn deck(&self) -> Option<&Path> {
        self.deck.as_deref()
    }

    pub fn index(&self) -> &SlideIndexSpace {
        &self.index
    }

    pub fn total_slides(&self) -> usize {
        if self.songs.is_empty() {
            self.deck_count
        } else {
            self.index.total()
        }
    }

    pub fn global_to_local(&self, global: usize) -> Result<(String, usize)> {
        self.index
            .global_to_local(global)
            .map(|(song, local)| (song.to_string(), local))
    }

    pub fn local_to_global(&self, song: &str, local: usize) -> Result<usize> {
        self.index.local_to_global(song, local)
    }

    fn song_deck(&self, name: &str) -> Result<PathBuf> {
        let song = self
            .songs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SlideError::SongNotFound(name.to_string()))?;
        song.resolved_deck()
            .ok_or_else(|| SlideError::MissingInput(song.deck().map(Path::to_path_buf).unwrap_or_default()))
    }

    /// Image of a global slide index. Conversion problems yield the
    /// placeholder; only bad indices fail.
    pub fn slide_image(&self, global: usize) -> Result<SlideImage> {
        if self.songs.is_empty() {
            let deck = self
                .deck
                .as_deref()
                .filter(|_| global < self.deck_count)
                .ok_or(SlideError::InvalidIndex(global))?;
            return Ok(self.engine.render(deck, global));
        }
        let (song, local) = self.index.global_to_local(global)?;
        let deck = self.song_deck(song)?;
        Ok(self.engine.render(&deck, local))
    }

    pub fn song_slide_image(&self, song: &str, local: usize) -> Result<SlideImage> {
        self.index.local_to_global(song, local)?;
        let deck = self.song_deck(song)?;
        Ok(self.engine.render(&deck, local))
    }
}

impl SlideSource for SlideManager {
    fn slide_image(&self, global: usize) -> Result<SlideImage> {
        SlideManager::slide_image(self, global)
    }
}

impl Drop for SlideManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::tests::{broken_engine, fake_engine};
    use crate::convert::{PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH};
    use crate::deck::tests::write_pptx;
    use crate::worker::tests::SlowEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct Harness {
        _tmp: tempfile::TempDir,
        dir: PathBuf,
        calls: Arc<AtomicUsize>,
        manager: SlideManager,
        rx: Receiver<ManagerEvent>,
    }

    fn harness() -> Harness {
        harness_with(|cache, calls| Arc::new(fake_engine(cache, calls)))
    }

    fn harness_with(
        make_engine: impl FnOnce(&Path, Arc<AtomicUsize>) -> Arc<dyn ConverterEngine>,
    ) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = make_engine(&dir.join("cache"), calls.clone());
        let (tx, rx) = mpsc::channel();
        let manager = SlideManager::new(engine, tx).unwrap();
        Harness {
            _tmp: tmp,
            dir,
            calls,
            manager,
            rx,
        }
    }

    impl Harness {
        fn deck(&self, name: &str, slides: usize) -> PathBuf {
            let path = self.dir.join(format!("{name}.pptx"));
            write_pptx(&path, slides);
            path
        }

        /// Pump the manager until an event matching `done` arrives.
        fn run_until(&mut self, done: impl Fn(&ManagerEvent) -> bool) -> Vec<ManagerEvent> {
            let deadline = Instant::now() + Duration::from_secs(10);
            let mut events = Vec::new();
            while Instant::now() < deadline {
                self.manager.wait_events(Duration::from_millis(50));
                for event in self.rx.try_iter() {
                    let finished = done(&event);
                    events.push(event);
                    if finished {
                        return events;
                    }
                }
            }
            panic!("timed out; got {events:?}");
        }
    }

    fn is_finished(event: &ManagerEvent) -> bool {
        matches!(event, ManagerEvent::LoadFinished(_))
    }

    #[test]
    fn test_single_deck_load() {
        let mut h = harness();
        let deck = h.deck("a", 3);

        assert!(h.manager.load_deck(&deck).unwrap());
        let events = h.run_until(is_finished);
        assert_eq!(events.first(), Some(&ManagerEvent::LoadStarted));
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(3)));
        let progress = events
            .iter()
            .filter(|e| matches!(e, ManagerEvent::LoadProgress { .. }))
            .count();
        assert_eq!(progress, 3);

        assert_eq!(h.manager.total_slides(), 3);
        assert!(!h.manager.is_busy());
        let image = h.manager.slide_image(1).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 2);
        assert!(matches!(h.manager.slide_image(3), Err(SlideError::InvalidIndex(3))));

        assert!(!h.manager.load_deck(&deck).unwrap());
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_songs_are_scanned_then_rendered() {
        let mut h = harness();
        let a = h.deck("A", 3);
        let b = h.deck("B", 2);
        h.manager.load_songs(vec![
            Song::new("A", a),
            Song::without_deck("Hymn without slides"),
            Song::new("B", b),
        ]);

        let events = h.run_until(is_finished);
        assert_eq!(events[0], ManagerEvent::MetadataScanStarted);
        assert!(events.contains(&ManagerEvent::MetadataScanFinished(5)));
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(5)));

        assert_eq!(h.manager.total_slides(), 5);
        assert_eq!(h.manager.index().offset_of("B").unwrap(), 3);
        assert_eq!(h.manager.global_to_local(4).unwrap(), ("B".to_string(), 1));
        assert_eq!(h.manager.local_to_global("A", 2).unwrap(), 2);

        let image = h.manager.slide_image(4).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 2);
        let image = h.manager.song_slide_image("A", 0).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 1);
        assert!(h.manager.slide_image(5).is_err());
        assert!(matches!(
            h.manager.song_slide_image("C", 0),
            Err(SlideError::SongNotFound(_))
        ));
        // One conversion per deck.
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_deck_loads_with_placeholders() {
        let mut h = harness();
        let deck = h.dir.join("empty.pptx");
        std::fs::write(&deck, "").unwrap();

        h.manager.load_deck(&deck).unwrap();
        let events = h.run_until(is_finished);
        assert!(!events.iter().any(|e| matches!(e, ManagerEvent::LoadError(_))));
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(0)));

        let image = h.manager.engine().render(&deck, 0);
        assert_eq!(image.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
    }

    #[test]
    fn test_corrupt_deck_loads_with_placeholders() {
        let mut h = harness();
        let deck = h.dir.join("bad.pptx");
        std::fs::write(&deck, "not a zip").unwrap();

        h.manager.load_deck(&deck).unwrap();
        let events = h.run_until(is_finished);
        assert!(!events.iter().any(|e| matches!(e, ManagerEvent::LoadError(_))));
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(0)));
    }

    #[test]
    fn test_toolchain_failure_serves_placeholders() {
        let mut h = harness_with(|cache, _| Arc::new(broken_engine(cache)));
        let deck = h.deck("a", 3);

        h.manager.load_deck(&deck).unwrap();
        let events = h.run_until(is_finished);
        assert!(!events.iter().any(|e| matches!(e, ManagerEvent::LoadError(_))));
        assert!(events.iter().any(|e| matches!(
            e,
            ManagerEvent::LoadStatus(message) if message.starts_with("Conversion failed")
        )));
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(3)));

        assert_eq!(h.manager.total_slides(), 3);
        for index in 0..3 {
            let image = h.manager.slide_image(index).unwrap();
            assert_eq!(image.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
        }
    }

    #[test]
    fn test_reload_song_during_scan_keeps_all_counts() {
        let mut h = harness();
        let a = h.deck("A", 3);
        let b = h.deck("B", 2);
        h.manager.load_songs(vec![Song::new("A", a), Song::new("B", b)]);
        h.manager.reload_song("A").unwrap();

        let events = h.run_until(is_finished);
        assert!(events.contains(&ManagerEvent::MetadataScanFinished(5)));
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(5)));
        assert_eq!(h.manager.total_slides(), 5);
        assert_eq!(h.manager.global_to_local(4).unwrap(), ("B".to_string(), 1));
    }

    #[test]
    fn test_scan_songs_does_not_render() {
        let mut h = harness();
        let a = h.deck("A", 3);
        let b = h.deck("B", 2);
        h.manager.scan_songs(vec![Song::new("A", a), Song::new("B", b)]);

        let events = h.run_until(|e| matches!(e, ManagerEvent::MetadataScanFinished(_)));
        assert_eq!(events.last(), Some(&ManagerEvent::MetadataScanFinished(5)));
        assert!(!h.manager.is_busy());

        h.manager.wait_events(Duration::from_millis(200));
        assert!(h.rx.try_iter().next().is_none());
        assert_eq!(h.manager.global_to_local(3).unwrap(), ("B".to_string(), 0));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reload_all_clears_cache() {
        let mut h = harness();
        let deck = h.deck("a", 2);
        h.manager.load_deck(&deck).unwrap();
        h.run_until(is_finished);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        h.manager.reload_all().unwrap();
        h.run_until(is_finished);
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_song() {
        let mut h = harness();
        let a = h.deck("A", 1);
        h.manager.load_songs(vec![Song::new("A", &a)]);
        h.run_until(is_finished);

        write_pptx(&a, 4);
        h.manager.reload_song("A").unwrap();
        let events = h.run_until(is_finished);
        assert_eq!(events.last(), Some(&ManagerEvent::LoadFinished(4)));
        assert_eq!(h.manager.total_slides(), 4);

        assert!(matches!(
            h.manager.reload_song("Nope"),
            Err(SlideError::SongNotFound(_))
        ));
    }

    #[test]
    fn test_missing_deck_is_rejected() {
        let mut h = harness();
        let err = h.manager.load_deck(&h.dir.join("gone.pptx")).unwrap_err();
        assert!(matches!(err, SlideError::MissingInput(_)));
        assert!(!h.manager.is_busy());
    }

    #[test]
    fn test_new_load_cancels_previous() {
        let (tx, rx) = mpsc::channel();
        let engine = Arc::new(SlowEngine {
            slides: 40,
            delay: Duration::from_millis(20),
        });
        let mut manager = SlideManager::new(engine, tx).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first.pptx");
        let second = tmp.path().join("second.pptx");
        std::fs::write(&first, "x").unwrap();
        std::fs::write(&second, "x").unwrap();

        manager.load_deck(&first).unwrap();
        manager.wait_events(Duration::from_millis(100));
        manager.load_deck(&second).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut finished = Vec::new();
        while finished.is_empty() && Instant::now() < deadline {
            manager.wait_events(Duration::from_millis(50));
            finished.extend(rx.try_iter().filter(|e| matches!(e, ManagerEvent::LoadFinished(_))));
        }
        assert_eq!(finished, vec![ManagerEvent::LoadFinished(40)]);
        assert_eq!(manager.deck(), Some(second.canonicalize().unwrap().as_path()));
    }

    #[test]
    fn test_reset_worker_replaces_thread() {
        let mut h = harness();
        let first = h.manager.worker.as_ref().map(Worker::id);
        h.manager.reset_worker().unwrap();
        let second = h.manager.worker.as_ref().map(Worker::id);
        assert_ne!(first, second);

        let deck = h.deck("a", 1);
        h.manager.load_deck(&deck).unwrap();
        h.run_until(is_finished);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut h = harness();
        h.manager.shutdown();
        h.manager.shutdown();
        assert!(h.manager.worker.is_none());
    }

    #[test]
    fn test_file_change_is_forwarded() {
        let mut h = harness();
        let deck = h.deck("a", 1);
        h.manager.start_watching(&deck).unwrap();
        assert!(h.manager.is_watching());
        std::thread::sleep(Duration::from_millis(100));
        write_pptx(&deck, 2);

        let events = h.run_until(|e| matches!(e, ManagerEvent::FileChanged(_)));
        assert_eq!(
            events.last(),
            Some(&ManagerEvent::FileChanged(deck.canonicalize().unwrap()))
        );
        h.manager.stop_watching();
        assert!(!h.manager.is_watching());
    }
}

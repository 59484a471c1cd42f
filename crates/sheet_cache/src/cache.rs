use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use tracing::{debug, error};

use crate::actor::CacheActor;
use crate::recency::RecencyViolation;
use crate::stats::{CacheCounters, CacheStats};
use crate::{
    CacheEvent, CacheStartError, RequestError, ResidentSheet, SheetDescriptor, SheetIndex,
    SheetLoader,
};

pub const DEFAULT_CAPACITY_BYTES: u64 = 1 << 30;

const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Initial budget in bytes for the sum of resident sheet sizes.
    pub capacity_bytes: u64,
    /// How long the actor blocks on an empty queue before rechecking the stop flag.
    pub idle_wait: Duration,
    pub thread_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            idle_wait: Duration::from_millis(1),
            thread_name: "sheet_cache".to_owned(),
        }
    }
}

pub(crate) enum CacheRequest {
    Touch(SheetIndex),
    Flush(Sender<CacheSnapshot>),
}

pub(crate) struct SheetSlot<R> {
    pub(crate) descriptor: SheetDescriptor,
    pub(crate) resident: ArcSwapOption<ResidentSheet<R>>,
}

/// State visible to both producers and the actor.
pub(crate) struct SharedSheets<R> {
    slots: Box<[SheetSlot<R>]>,
    capacity: AtomicU64,
    pub(crate) counters: CacheCounters,
}

impl<R> SharedSheets<R> {
    pub(crate) fn new(descriptors: Vec<SheetDescriptor>, capacity: u64) -> Self {
        let slots = descriptors
            .into_iter()
            .map(|descriptor| SheetSlot {
                descriptor,
                resident: ArcSwapOption::empty(),
            })
            .collect();
        Self {
            slots,
            capacity: AtomicU64::new(capacity),
            counters: CacheCounters::default(),
        }
    }

    pub(crate) fn sheet_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slots(&self) -> &[SheetSlot<R>] {
        &self.slots
    }

    pub(crate) fn slot(&self, index: SheetIndex) -> Option<&SheetSlot<R>> {
        self.slots.get(index.slot())
    }

    /// Indexes validated by a producer before they reach the actor.
    pub(crate) fn slot_at(&self, index: SheetIndex) -> &SheetSlot<R> {
        &self.slots[index.slot()]
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Relaxed)
    }

    pub(crate) fn set_capacity(&self, capacity: u64) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }
}

/// Actor state captured by [`SheetCache::flush`] after every earlier request
/// has been processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Resident sheets, most recently used first.
    pub recency: Vec<SheetIndex>,
    pub resident_bytes: u64,
    pub capacity: u64,
    pub violation: Option<RecencyViolation>,
}

impl CacheSnapshot {
    pub fn head(&self) -> Option<SheetIndex> {
        self.recency.first().copied()
    }

    pub fn tail(&self) -> Option<SheetIndex> {
        self.recency.last().copied()
    }

    pub fn contains(&self, index: SheetIndex) -> bool {
        self.recency.contains(&index)
    }

    pub fn is_consistent(&self) -> bool {
        self.violation.is_none()
    }
}

/// Cloneable producer side of a [`SheetCache`].
pub struct SheetRequester<R> {
    shared: Arc<SharedSheets<R>>,
    sender: Sender<CacheRequest>,
}

impl<R> Clone for SheetRequester<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            sender: self.sender.clone(),
        }
    }
}

impl<R> SheetRequester<R> {
    /// Enqueues a touch of `index` and returns the handle resident right now.
    ///
    /// A first request for a sheet normally returns `None`; the handle shows up
    /// on a later call once the actor has loaded it.
    pub fn request_resident(
        &self,
        index: SheetIndex,
    ) -> Result<Option<Arc<ResidentSheet<R>>>, RequestError> {
        let slot = self.shared.slot(index).ok_or(RequestError::OutOfRange {
            index,
            sheet_count: self.shared.sheet_count(),
        })?;
        let resident = slot.resident.load_full();
        self.sender
            .send(CacheRequest::Touch(index))
            .map_err(|_| RequestError::ActorStopped)?;
        Ok(resident)
    }

    /// Current handle without recording a touch.
    pub fn resident(&self, index: SheetIndex) -> Option<Arc<ResidentSheet<R>>> {
        self.shared.slot(index)?.resident.load_full()
    }

    pub fn sheet_count(&self) -> usize {
        self.shared.sheet_count()
    }
}

/// Owner of the cache actor thread.
///
/// Dropping the cache stops the actor, which releases every resident sheet
/// before the thread exits.
pub struct SheetCache<R> {
    requester: SheetRequester<R>,
    stop_requested: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl<R: Send + Sync + 'static> SheetCache<R> {
    pub fn start<L>(
        sheets: Vec<SheetDescriptor>,
        loader: L,
        config: CacheConfig,
    ) -> Result<Self, CacheStartError>
    where
        L: SheetLoader<Resource = R>,
    {
        Self::spawn(sheets, loader, config, None)
    }

    /// Like [`SheetCache::start`], also returning the actor's event stream.
    pub fn start_with_events<L>(
        sheets: Vec<SheetDescriptor>,
        loader: L,
        config: CacheConfig,
    ) -> Result<(Self, Receiver<CacheEvent>), CacheStartError>
    where
        L: SheetLoader<Resource = R>,
    {
        let (event_sender, event_receiver) = unbounded();
        let cache = Self::spawn(sheets, loader, config, Some(event_sender))?;
        Ok((cache, event_receiver))
    }

    fn spawn<L>(
        sheets: Vec<SheetDescriptor>,
        loader: L,
        config: CacheConfig,
        events: Option<Sender<CacheEvent>>,
    ) -> Result<Self, CacheStartError>
    where
        L: SheetLoader<Resource = R>,
    {
        if u32::try_from(sheets.len()).is_err() {
            return Err(CacheStartError::TooManySheets { len: sheets.len() });
        }
        for (position, sheet) in sheets.iter().enumerate() {
            if sheet.index.slot() != position {
                return Err(CacheStartError::SheetOutOfOrder {
                    position,
                    index: sheet.index,
                });
            }
        }

        let shared = Arc::new(SharedSheets::new(sheets, config.capacity_bytes));
        let (sender, receiver) = unbounded();
        let stop_requested = Arc::new(AtomicBool::new(false));

        let actor = CacheActor::new(loader, Arc::clone(&shared), events);
        let thread_stop = Arc::clone(&stop_requested);
        let idle_wait = config.idle_wait;
        let join_handle = std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || actor.run(receiver, thread_stop, idle_wait))
            .map_err(CacheStartError::Spawn)?;

        Ok(Self {
            requester: SheetRequester { shared, sender },
            stop_requested,
            join_handle: Some(join_handle),
        })
    }
}

impl<R> SheetCache<R> {
    pub fn request_resident(
        &self,
        index: SheetIndex,
    ) -> Result<Option<Arc<ResidentSheet<R>>>, RequestError> {
        self.requester.request_resident(index)
    }

    pub fn resident(&self, index: SheetIndex) -> Option<Arc<ResidentSheet<R>>> {
        self.requester.resident(index)
    }

    pub fn requester(&self) -> SheetRequester<R> {
        self.requester.clone()
    }

    pub fn sheet_count(&self) -> usize {
        self.requester.sheet_count()
    }

    pub fn descriptor(&self, index: SheetIndex) -> Option<&SheetDescriptor> {
        self.requester
            .shared
            .slot(index)
            .map(|slot| &slot.descriptor)
    }

    /// Replaces the budget. Already resident sheets stay until the next load
    /// needs room.
    pub fn set_capacity(&self, capacity_bytes: u64) {
        self.requester.shared.set_capacity(capacity_bytes);
        debug!(capacity = capacity_bytes, "sheet cache capacity updated");
    }

    pub fn capacity(&self) -> u64 {
        self.requester.shared.capacity()
    }

    /// Resident bytes as last published by the actor.
    pub fn resident_bytes(&self) -> u64 {
        self.requester.shared.counters.resident_bytes()
    }

    pub fn stats(&self) -> CacheStats {
        self.requester.shared.counters.snapshot(self.capacity())
    }

    /// Waits until the actor has handled every request enqueued before this
    /// call, then returns its state.
    pub fn flush(&self) -> Result<CacheSnapshot, RequestError> {
        let (reply_sender, reply_receiver) = bounded(1);
        self.requester
            .sender
            .send(CacheRequest::Flush(reply_sender))
            .map_err(|_| RequestError::ActorStopped)?;
        loop {
            match reply_receiver.recv_timeout(FLUSH_POLL_INTERVAL) {
                Ok(snapshot) => return Ok(snapshot),
                Err(RecvTimeoutError::Disconnected) => return Err(RequestError::ActorStopped),
                Err(RecvTimeoutError::Timeout) => {
                    let finished = self
                        .join_handle
                        .as_ref()
                        .is_none_or(|handle| handle.is_finished());
                    if finished {
                        return Err(RequestError::ActorStopped);
                    }
                }
            }
        }
    }

    /// Stops the actor and waits for it to release all resident sheets.
    ///
    /// Touches still queued when the actor observes the stop flag are
    /// discarded without loading.
    pub fn shutdown(mut self) {
        self.stop_actor();
    }

    fn stop_actor(&mut self) {
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };
        self.stop_requested.store(true, Ordering::Release);
        if join_handle.join().is_err() {
            error!("sheet cache actor panicked");
        }
    }
}

impl<R> Drop for SheetCache<R> {
    fn drop(&mut self) {
        self.stop_actor();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::{CacheError, SheetLoadError};

    #[derive(Clone, Default)]
    struct MemoryLoader {
        released: Arc<Mutex<Vec<u32>>>,
    }

    impl SheetLoader for MemoryLoader {
        type Resource = Vec<u8>;

        fn load(&self, sheet: &SheetDescriptor) -> Result<Vec<u8>, SheetLoadError> {
            if sheet.locator.as_os_str() == "missing" {
                return Err(SheetLoadError::Unavailable {
                    path: sheet.locator.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(vec![sheet.index.raw() as u8; 4])
        }

        fn release(&self, sheet: &SheetDescriptor, _resource: &Vec<u8>) {
            self.released.lock().unwrap().push(sheet.index.raw());
        }
    }

    fn descriptors(sizes: &[u64]) -> Vec<SheetDescriptor> {
        sizes
            .iter()
            .enumerate()
            .map(|(position, &byte_size)| SheetDescriptor {
                index: SheetIndex::new(position as u32),
                byte_size,
                locator: PathBuf::from(format!("sheet{position}")),
            })
            .collect()
    }

    fn config(capacity_bytes: u64) -> CacheConfig {
        CacheConfig {
            capacity_bytes,
            ..CacheConfig::default()
        }
    }

    fn sheet(raw: u32) -> SheetIndex {
        SheetIndex::new(raw)
    }

    #[test]
    fn first_request_returns_nothing_then_handle_after_flush() {
        let cache =
            SheetCache::start(descriptors(&[600, 500]), MemoryLoader::default(), config(1000))
                .unwrap();

        assert!(cache.request_resident(sheet(0)).unwrap().is_none());
        let snapshot = cache.flush().unwrap();
        assert_eq!(snapshot.recency, [sheet(0)]);
        assert_eq!(snapshot.resident_bytes, 600);

        let handle = cache.request_resident(sheet(0)).unwrap().unwrap();
        assert_eq!(handle.index(), sheet(0));
        assert_eq!(handle.byte_size(), 600);
        assert_eq!(handle.resource().as_slice(), [0, 0, 0, 0]);
    }

    #[test]
    fn second_sheet_replaces_first_under_tight_budget() {
        let cache =
            SheetCache::start(descriptors(&[600, 500]), MemoryLoader::default(), config(1000))
                .unwrap();

        cache.request_resident(sheet(0)).unwrap();
        cache.request_resident(sheet(1)).unwrap();
        let snapshot = cache.flush().unwrap();

        assert_eq!(snapshot.recency, [sheet(1)]);
        assert_eq!(snapshot.resident_bytes, 500);
        assert!(snapshot.is_consistent());
        assert!(cache.resident(sheet(0)).is_none());
        assert_eq!(cache.resident_bytes(), 500);
    }

    #[test]
    fn held_handle_survives_eviction() {
        let cache =
            SheetCache::start(descriptors(&[600, 500]), MemoryLoader::default(), config(1000))
                .unwrap();
        cache.request_resident(sheet(0)).unwrap();
        cache.flush().unwrap();
        let held = cache.request_resident(sheet(0)).unwrap().unwrap();

        cache.request_resident(sheet(1)).unwrap();
        cache.flush().unwrap();

        assert!(cache.resident(sheet(0)).is_none());
        assert_eq!(held.resource().len(), 4);
    }

    #[test]
    fn out_of_range_request_is_rejected_without_enqueueing() {
        let cache =
            SheetCache::start(descriptors(&[10]), MemoryLoader::default(), config(100)).unwrap();

        let error = cache.request_resident(sheet(5)).unwrap_err();
        assert_eq!(
            error,
            RequestError::OutOfRange {
                index: sheet(5),
                sheet_count: 1
            }
        );
        cache.flush().unwrap();
        assert_eq!(cache.stats().touches, 0);
    }

    #[test]
    fn events_report_failures_and_actor_keeps_serving() {
        let mut sheets = descriptors(&[10, 2000, 10]);
        sheets[2].locator = PathBuf::from("missing");
        sheets.push(SheetDescriptor {
            index: sheet(3),
            byte_size: 10,
            locator: PathBuf::from("sheet3"),
        });
        let (cache, events) =
            SheetCache::start_with_events(sheets, MemoryLoader::default(), config(100)).unwrap();

        for raw in [1, 2, 3] {
            cache.request_resident(sheet(raw)).unwrap();
        }
        let snapshot = cache.flush().unwrap();
        assert_eq!(snapshot.recency, [sheet(3)]);

        let events: Vec<_> = events.try_iter().collect();
        assert!(matches!(
            events.as_slice(),
            [
                CacheEvent::Failed(CacheError::CapacityExceeded { .. }),
                CacheEvent::Failed(CacheError::Load { .. }),
                CacheEvent::Loaded { byte_size: 10, .. },
            ]
        ));
        let stats = cache.stats();
        assert_eq!(stats.capacity_rejections, 1);
        assert_eq!(stats.load_failures, 1);
        assert_eq!(stats.loads, 1);
    }

    #[test]
    fn capacity_change_applies_on_next_load() {
        let cache =
            SheetCache::start(descriptors(&[40, 40, 40]), MemoryLoader::default(), config(120))
                .unwrap();
        cache.request_resident(sheet(0)).unwrap();
        cache.request_resident(sheet(1)).unwrap();
        cache.flush().unwrap();

        cache.set_capacity(50);
        assert_eq!(cache.capacity(), 50);
        let snapshot = cache.flush().unwrap();
        assert_eq!(snapshot.resident_bytes, 80);
        assert_eq!(snapshot.capacity, 50);

        cache.request_resident(sheet(2)).unwrap();
        let snapshot = cache.flush().unwrap();
        assert_eq!(snapshot.recency, [sheet(2)]);
        assert_eq!(snapshot.resident_bytes, 40);
    }

    #[test]
    fn concurrent_producers_keep_structure_valid() {
        let sizes = [30, 50, 20, 70, 10, 40];
        let cache =
            SheetCache::start(descriptors(&sizes), MemoryLoader::default(), config(100)).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4u32 {
                let requester = cache.requester();
                scope.spawn(move || {
                    for step in 0..200u32 {
                        let raw = (worker * 7 + step * 3) % sizes.len() as u32;
                        requester.request_resident(sheet(raw)).unwrap();
                    }
                });
            }
        });

        let snapshot = cache.flush().unwrap();
        assert!(snapshot.is_consistent());
        assert!(snapshot.resident_bytes <= 100);
        assert_eq!(cache.stats().touches, 800);
    }

    #[test]
    fn shutdown_releases_every_resident_sheet() {
        let loader = MemoryLoader::default();
        let released = Arc::clone(&loader.released);
        let cache = SheetCache::start(descriptors(&[10, 10, 10]), loader, config(100)).unwrap();
        for raw in [0, 1, 2] {
            cache.request_resident(sheet(raw)).unwrap();
        }
        cache.flush().unwrap();

        cache.shutdown();

        let mut released = released.lock().unwrap().clone();
        released.sort_unstable();
        assert_eq!(released, [0, 1, 2]);
    }

    #[test]
    fn requester_reports_stopped_actor() {
        let cache =
            SheetCache::start(descriptors(&[10]), MemoryLoader::default(), config(100)).unwrap();
        let requester = cache.requester();
        drop(cache);

        assert_eq!(
            requester.request_resident(sheet(0)).unwrap_err(),
            RequestError::ActorStopped
        );
        assert!(requester.resident(sheet(0)).is_none());
        assert_eq!(requester.sheet_count(), 1);
    }

    #[test]
    fn out_of_order_sheet_table_is_rejected() {
        let mut sheets = descriptors(&[10, 10]);
        sheets.swap(0, 1);

        let error = SheetCache::start(sheets, MemoryLoader::default(), config(100))
            .err()
            .unwrap();
        assert!(matches!(
            error,
            CacheStartError::SheetOutOfOrder { position: 0, .. }
        ));
    }
}

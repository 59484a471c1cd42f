use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::cache::{CacheRequest, CacheSnapshot, SharedSheets};
use crate::recency::{RecencyList, RecencyViolation};
use crate::{CacheError, CacheEvent, ResidentSheet, SheetIndex, SheetLoader};

/// Exclusive owner of the recency list and resident byte count.
///
/// Only the actor thread touches this struct, so none of its fields need
/// synchronization. Producers observe residency through the shared slots.
pub(crate) struct CacheActor<L: SheetLoader> {
    loader: L,
    shared: Arc<SharedSheets<L::Resource>>,
    recency: RecencyList,
    resident_bytes: u64,
    events: Option<Sender<CacheEvent>>,
}

impl<L: SheetLoader> CacheActor<L> {
    pub(crate) fn new(
        loader: L,
        shared: Arc<SharedSheets<L::Resource>>,
        events: Option<Sender<CacheEvent>>,
    ) -> Self {
        let recency = RecencyList::new(shared.sheet_count());
        Self {
            loader,
            shared,
            recency,
            resident_bytes: 0,
            events,
        }
    }

    pub(crate) fn run(
        mut self,
        receiver: Receiver<CacheRequest>,
        stop_requested: Arc<AtomicBool>,
        idle_wait: Duration,
    ) {
        info!(
            sheets = self.shared.sheet_count(),
            capacity = self.shared.capacity(),
            "sheet cache actor started"
        );
        while !stop_requested.load(Ordering::Acquire) {
            let request = match receiver.recv_timeout(idle_wait) {
                Ok(request) => request,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.handle_request(request);
        }

        // Dropping queued flush replies unblocks their callers.
        let discarded = receiver.try_iter().count();
        self.release_all();
        info!(discarded, "sheet cache actor stopped");
    }

    pub(crate) fn handle_request(&mut self, request: CacheRequest) {
        match request {
            CacheRequest::Touch(index) => {
                if let Err(error) = self.touch(index) {
                    self.report_failure(error);
                }
                if cfg!(debug_assertions) {
                    if let Err(violation) = self.validate() {
                        panic!("sheet cache invariant violated: {violation}");
                    }
                }
            }
            CacheRequest::Flush(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Makes `index` resident if needed, then marks it most recently used.
    pub(crate) fn touch(&mut self, index: SheetIndex) -> Result<(), CacheError> {
        self.shared.counters.record_touch();
        if !self.recency.contains(index) {
            self.load(index)?;
        }
        self.recency.promote(index);
        Ok(())
    }

    /// Detaches and releases the least recently used sheet.
    pub(crate) fn evict_tail(&mut self) -> Option<SheetIndex> {
        let index = self.recency.pop_tail()?;
        let slot = self.shared.slot_at(index);
        let byte_size = slot.descriptor.byte_size;
        if let Some(resident) = slot.resident.swap(None) {
            self.loader.release(&slot.descriptor, resident.resource());
        }
        self.resident_bytes -= byte_size;
        self.shared.counters.record_eviction(byte_size);
        debug!(
            sheet = index.raw(),
            byte_size,
            resident_bytes = self.resident_bytes,
            resident_sheets = self.recency.len(),
            "sheet evicted"
        );
        self.emit(CacheEvent::Evicted { index, byte_size });
        Some(index)
    }

    pub(crate) fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            recency: self.recency.iter().collect(),
            resident_bytes: self.resident_bytes,
            capacity: self.shared.capacity(),
            violation: self.validate().err(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RecencyViolation> {
        self.recency.validate()?;

        let listed: u64 = self
            .recency
            .iter()
            .map(|index| self.shared.slot_at(index).descriptor.byte_size)
            .sum();
        if listed != self.resident_bytes {
            return Err(RecencyViolation::ResidentBytesMismatch {
                listed,
                recorded: self.resident_bytes,
            });
        }

        for slot in self.shared.slots() {
            let index = slot.descriptor.index;
            if slot.resident.load().is_some() != self.recency.contains(index) {
                return Err(RecencyViolation::ResidencyMismatch { index });
            }
        }
        Ok(())
    }

    fn load(&mut self, index: SheetIndex) -> Result<(), CacheError> {
        let byte_size = self.shared.slot_at(index).descriptor.byte_size;
        self.make_room(index, byte_size)?;

        let slot = self.shared.slot_at(index);
        let resource = self
            .loader
            .load(&slot.descriptor)
            .map_err(|source| CacheError::Load { index, source })?;
        slot.resident
            .store(Some(Arc::new(ResidentSheet::new(index, byte_size, resource))));
        self.resident_bytes += byte_size;
        self.shared.counters.record_load(byte_size);
        debug!(
            sheet = index.raw(),
            byte_size,
            resident_bytes = self.resident_bytes,
            "sheet loaded"
        );
        self.emit(CacheEvent::Loaded { index, byte_size });
        Ok(())
    }

    fn make_room(&mut self, index: SheetIndex, byte_size: u64) -> Result<(), CacheError> {
        let capacity = self.shared.capacity();
        let exceeded = CacheError::CapacityExceeded {
            index,
            byte_size,
            capacity,
        };
        if byte_size > capacity {
            return Err(exceeded);
        }
        while self.resident_bytes + byte_size > capacity {
            if self.evict_tail().is_none() {
                return Err(exceeded);
            }
        }
        Ok(())
    }

    fn release_all(&mut self) {
        while self.evict_tail().is_some() {}
    }

    fn report_failure(&self, error: CacheError) {
        match &error {
            CacheError::CapacityExceeded { .. } => {
                self.shared.counters.record_capacity_rejection()
            }
            CacheError::Load { .. } => self.shared.counters.record_load_failure(),
        }
        warn!(
            sheet = error.index().raw(),
            error = &error as &(dyn std::error::Error + 'static),
            "sheet request failed"
        );
        self.emit(CacheEvent::Failed(error));
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

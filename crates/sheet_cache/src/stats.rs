use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters of the sheet cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub touches: u64,
    pub loads: u64,
    pub evictions: u64,
    pub load_failures: u64,
    pub capacity_rejections: u64,
    pub resident_sheets: u64,
    pub resident_bytes: u64,
    pub capacity: u64,
}

impl CacheStats {
    /// Fraction of the budget in use, 0.0 for a zero budget.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.resident_bytes as f64 / self.capacity as f64
        }
    }

    /// Touches that found the sheet already resident.
    pub fn hits(&self) -> u64 {
        self.touches
            .saturating_sub(self.loads + self.load_failures + self.capacity_rejections)
    }
}

/// Written by the actor only, read from anywhere.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    touches: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
    load_failures: AtomicU64,
    capacity_rejections: AtomicU64,
    resident_sheets: AtomicU64,
    resident_bytes: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn record_touch(&self) {
        self.touches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, byte_size: u64) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.resident_sheets.fetch_add(1, Ordering::Relaxed);
        self.resident_bytes.fetch_add(byte_size, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self, byte_size: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.resident_sheets.fetch_sub(1, Ordering::Relaxed);
        self.resident_bytes.fetch_sub(byte_size, Ordering::Relaxed);
    }

    pub(crate) fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_capacity_rejection(&self) {
        self.capacity_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn resident_bytes(&self) -> u64 {
        self.resident_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self, capacity: u64) -> CacheStats {
        CacheStats {
            touches: self.touches.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            resident_sheets: self.resident_sheets.load(Ordering::Relaxed),
            resident_bytes: self.resident_bytes.load(Ordering::Relaxed),
            capacity,
        }
    }
}

//! Ingestion counters for address-rs

use crate::store::Origin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters updated by the hierarchy builder, assembler and coercion layer.
///
/// All counters are atomics so one instance can be shared by parallel
/// ingestion.
#[derive(Debug)]
pub struct IngestStats {
    started: Instant,
    components_created: AtomicUsize,
    components_reused: AtomicUsize,
    addresses_created: AtomicUsize,
    addresses_reused: AtomicUsize,
    addresses_updated: AtomicUsize,
    raw_fallbacks: AtomicUsize,
    geocode_lookups: AtomicUsize,
    conflicts_resolved: AtomicUsize,
    hierarchies_built: AtomicUsize,
    total_build_time: AtomicUsize, // microseconds
}

impl IngestStats {
    /// Create a new set of zeroed counters
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            components_created: AtomicUsize::new(0),
            components_reused: AtomicUsize::new(0),
            addresses_created: AtomicUsize::new(0),
            addresses_reused: AtomicUsize::new(0),
            addresses_updated: AtomicUsize::new(0),
            raw_fallbacks: AtomicUsize::new(0),
            geocode_lookups: AtomicUsize::new(0),
            conflicts_resolved: AtomicUsize::new(0),
            hierarchies_built: AtomicUsize::new(0),
            total_build_time: AtomicUsize::new(0),
        }
    }

    /// Record how a component row was obtained
    pub fn record_component(&self, origin: Origin) {
        match origin {
            Origin::Created => self.components_created.fetch_add(1, Ordering::Relaxed),
            Origin::Existing => self.components_reused.fetch_add(1, Ordering::Relaxed),
            Origin::LostRace => {
                self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
                self.components_reused.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    /// Record how an address row was obtained
    pub fn record_address(&self, origin: Origin) {
        match origin {
            Origin::Created => self.addresses_created.fetch_add(1, Ordering::Relaxed),
            Origin::Existing => self.addresses_reused.fetch_add(1, Ordering::Relaxed),
            Origin::LostRace => {
                self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
                self.addresses_reused.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    /// Record an in-place update of an existing address
    pub fn record_update(&self) {
        self.addresses_updated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a degraded raw-only ingestion
    pub fn record_fallback(&self) {
        self.raw_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a geocoder call
    pub fn record_lookup(&self) {
        self.geocode_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one hierarchy build
    pub fn record_build(&self, duration: Duration) {
        self.hierarchies_built.fetch_add(1, Ordering::Relaxed);
        self.total_build_time
            .fetch_add(duration.as_micros() as usize, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn summary(&self) -> StatsSummary {
        let hierarchies_built = self.hierarchies_built.load(Ordering::Relaxed);
        let total_build_time_us = self.total_build_time.load(Ordering::Relaxed);

        StatsSummary {
            components_created: self.components_created.load(Ordering::Relaxed),
            components_reused: self.components_reused.load(Ordering::Relaxed),
            addresses_created: self.addresses_created.load(Ordering::Relaxed),
            addresses_reused: self.addresses_reused.load(Ordering::Relaxed),
            addresses_updated: self.addresses_updated.load(Ordering::Relaxed),
            raw_fallbacks: self.raw_fallbacks.load(Ordering::Relaxed),
            geocode_lookups: self.geocode_lookups.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            hierarchies_built,
            total_runtime: self.started.elapsed(),
            average_build_time: if hierarchies_built > 0 {
                Duration::from_micros((total_build_time_us / hierarchies_built) as u64)
            } else {
                Duration::ZERO
            },
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.components_created,
            &self.components_reused,
            &self.addresses_created,
            &self.addresses_reused,
            &self.addresses_updated,
            &self.raw_fallbacks,
            &self.geocode_lookups,
            &self.conflicts_resolved,
            &self.hierarchies_built,
            &self.total_build_time,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`IngestStats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    /// Component rows inserted
    pub components_created: usize,
    /// Component rows found by dedup key
    pub components_reused: usize,
    /// Address rows inserted
    pub addresses_created: usize,
    /// Address rows found by raw string
    pub addresses_reused: usize,
    /// Existing addresses re-assembled in place
    pub addresses_updated: usize,
    /// Raw-only addresses produced because structured data was unusable
    pub raw_fallbacks: usize,
    /// Geocoder calls made
    pub geocode_lookups: usize,
    /// Inserts that lost a uniqueness race and re-fetched
    pub conflicts_resolved: usize,
    /// Hierarchy builds performed
    pub hierarchies_built: usize,
    /// Time since the counters were created
    pub total_runtime: Duration,
    /// Average time per hierarchy build
    pub average_build_time: Duration,
}

impl StatsSummary {
    /// Share of component lookups served by an existing row
    pub fn component_reuse_ratio(&self) -> f64 {
        let total = self.components_created + self.components_reused;
        if total > 0 {
            self.components_reused as f64 / total as f64
        } else {
            0.0
        }
    }
}

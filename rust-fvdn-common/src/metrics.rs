//! Metrics collection and reporting for fvDN.
//!
//! All instruments are built on one relaxed atomic cell, so a forwarder can
//! bump counters through a shared reference from any pipeline stage and a
//! host can snapshot them without stopping the clock.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Atomic cell underlying every instrument
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
struct AtomicCell(AtomicU64);

impl AtomicCell {
    fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn store(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    fn add(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    fn sub(&self, delta: u64) {
        self.0.fetch_sub(delta, Ordering::Relaxed);
    }
}

impl Clone for AtomicCell {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.load()))
    }
}

/* ---------------------------------------------------------------- *
 * Counter and Gauge
 * ---------------------------------------------------------------- */

/// Monotonically increasing event count.
#[derive(Debug, Default, Clone)]
pub struct Counter(AtomicCell);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.add(1);
    }

    pub fn add(&self, delta: u64) {
        self.0.add(delta);
    }

    pub fn value(&self) -> u64 {
        self.0.load()
    }
}

/// Settable level, e.g. the current PIT size.
#[derive(Debug, Default, Clone)]
pub struct Gauge(AtomicCell);

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.0.store(value);
    }

    pub fn increment(&self) {
        self.0.add(1);
    }

    pub fn decrement(&self) {
        self.0.sub(1);
    }

    pub fn value(&self) -> u64 {
        self.0.load()
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

/// Bucketed distribution, e.g. satisfaction round trips.
#[derive(Debug, Clone)]
pub struct Histogram {
    boundaries: Vec<u64>,
    buckets: Vec<AtomicCell>,
    underflow: AtomicCell,
    overflow: AtomicCell,
    sum: AtomicCell,
    count: AtomicCell,
}

impl Histogram {
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = boundaries.iter().map(|_| AtomicCell::default()).collect();
        Self {
            boundaries,
            buckets,
            underflow: AtomicCell::default(),
            overflow: AtomicCell::default(),
            sum: AtomicCell::default(),
            count: AtomicCell::default(),
        }
    }

    /// Geometrically spaced boundaries from `min` up to `max`.
    pub fn exponential(min: u64, max: u64, buckets: usize) -> Self {
        assert!(min < max && buckets > 1);
        let factor = (max as f64 / min as f64).powf(1.0 / (buckets as f64 - 1.0));
        let mut boundaries = Vec::with_capacity(buckets);
        let mut value = min;
        for _ in 0..buckets {
            boundaries.push(value);
            value = (value as f64 * factor).ceil() as u64;
        }
        Self::new(boundaries)
    }

    pub fn observe(&self, value: u64) {
        self.sum.add(value);
        self.count.add(1);

        if value < self.boundaries[0] {
            self.underflow.add(1);
            return;
        }
        match self.boundaries.iter().position(|&b| value <= b) {
            Some(idx) => self.buckets[idx].add(1),
            None => self.overflow.add(1),
        }
    }

    pub fn average(&self) -> f64 {
        match self.count.load() {
            0 => 0.0,
            n => self.sum.load() as f64 / n as f64,
        }
    }

    /// Per-bucket (boundary, count) pairs.
    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(self.buckets.iter())
            .map(|(&boundary, bucket)| (boundary, bucket.load()))
            .collect()
    }

    pub fn count(&self) -> u64 {
        self.count.load()
    }

    pub fn sum(&self) -> u64 {
        self.sum.load()
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for a forwarder
 * ---------------------------------------------------------------- */

#[derive(Debug, Default, Clone)]
pub struct ForwarderMetrics {
    // Packet counters
    pub n_in_interests: Counter,
    pub n_out_interests: Counter,
    pub n_in_datas: Counter,
    pub n_out_datas: Counter,

    // Cache counters
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,

    // PIT counters
    pub pit_inserts: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,

    // Loop suppression
    pub interest_loops: Counter,
    pub dnl_inserts: Counter,
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of all counter values, suitable for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            n_in_interests: self.n_in_interests.value(),
            n_out_interests: self.n_out_interests.value(),
            n_in_datas: self.n_in_datas.value(),
            n_out_datas: self.n_out_datas.value(),
            cs_hits: self.cs_hits.value(),
            cs_misses: self.cs_misses.value(),
            cs_inserts: self.cs_inserts.value(),
            pit_inserts: self.pit_inserts.value(),
            pit_expirations: self.pit_expirations.value(),
            pit_size: self.pit_size.value(),
            interest_loops: self.interest_loops.value(),
            dnl_inserts: self.dnl_inserts.value(),
        }
    }
}

/// Serializable snapshot of [`ForwarderMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub n_in_interests: u64,
    pub n_out_interests: u64,
    pub n_in_datas: u64,
    pub n_out_datas: u64,
    pub cs_hits: u64,
    pub cs_misses: u64,
    pub cs_inserts: u64,
    pub pit_inserts: u64,
    pub pit_expirations: u64,
    pub pit_size: u64,
    pub interest_loops: u64,
    pub dnl_inserts: u64,
}

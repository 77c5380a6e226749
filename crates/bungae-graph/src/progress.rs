//! Build progress observation.
//!
//! A bounded observer interface with two signals: `on_discovered` fires when
//! a file enters the queue (incrementing the total), `on_processed` when a
//! module and all of its dependencies have finished processing. The builder
//! guarantees `processed <= total` at every observable moment. The server
//! adapts this to multipart progress chunks; tests adapt it to counters.

pub trait ProgressObserver {
    fn on_discovered(&mut self, total: usize);
    fn on_processed(&mut self, processed: usize, total: usize);
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_discovered(&mut self, _total: usize) {}
    fn on_processed(&mut self, _processed: usize, _total: usize) {}
}

/// Observer that records the last seen counters.
#[derive(Debug, Default)]
pub struct CountingObserver {
    pub total: usize,
    pub processed: usize,
    /// True if `processed > total` was ever observed.
    pub overshoot: bool,
}

impl ProgressObserver for CountingObserver {
    fn on_discovered(&mut self, total: usize) {
        self.total = total;
    }

    fn on_processed(&mut self, processed: usize, total: usize) {
        self.processed = processed;
        self.total = total;
        if processed > total {
            self.overshoot = true;
        }
    }
}

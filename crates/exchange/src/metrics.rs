//! Exchange counters, exported through `prometheus-client`.
//!
//! - `exchange_sent_bytes_total`: encoded bytes of frames written to peers
//! - `exchange_received_bytes_total`: encoded bytes of frames read from peers
//! - `exchange_blocks_received_total`: verified blocks that resolved a want
//! - `exchange_blocks_rejected_total`: blocks dropped for a bad prefix or digest
//! - `exchange_unwanted_blocks_total`: verified blocks nobody was waiting for

#[cfg(test)]
#[path = "tests/metrics.rs"]
mod tests;

use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Cloning shares the underlying counters.
#[derive(Clone, Debug, Default)]
pub struct ExchangeMetrics {
    sent_bytes: Counter,
    received_bytes: Counter,
    blocks_received: Counter,
    blocks_rejected: Counter,
    unwanted_blocks: Counter,
}

impl ExchangeMetrics {
    /// Creates the counters and registers them with `registry`.
    #[must_use]
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        metrics.register(registry);
        metrics
    }

    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "exchange_sent_bytes",
            "Encoded bytes of frames written to peers",
            self.sent_bytes.clone(),
        );
        registry.register(
            "exchange_received_bytes",
            "Encoded bytes of frames read from peers",
            self.received_bytes.clone(),
        );
        registry.register(
            "exchange_blocks_received",
            "Verified blocks that resolved a pending want",
            self.blocks_received.clone(),
        );
        registry.register(
            "exchange_blocks_rejected",
            "Blocks dropped for an unsupported prefix or a digest mismatch",
            self.blocks_rejected.clone(),
        );
        registry.register(
            "exchange_unwanted_blocks",
            "Verified blocks that no pending want was waiting for",
            self.unwanted_blocks.clone(),
        );
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        let _ = self.sent_bytes.inc_by(bytes as u64);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        let _ = self.received_bytes.inc_by(bytes as u64);
    }

    pub(crate) fn record_block_received(&self) {
        let _ = self.blocks_received.inc();
    }

    pub(crate) fn record_block_rejected(&self) {
        let _ = self.blocks_rejected.inc();
    }

    pub(crate) fn record_unwanted_block(&self) {
        let _ = self.unwanted_blocks.inc();
    }

    #[must_use]
    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes.get()
    }

    #[must_use]
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.get()
    }

    #[must_use]
    pub fn blocks_received(&self) -> u64 {
        self.blocks_received.get()
    }

    #[must_use]
    pub fn blocks_rejected(&self) -> u64 {
        self.blocks_rejected.get()
    }

    #[must_use]
    pub fn unwanted_blocks(&self) -> u64 {
        self.unwanted_blocks.get()
    }
}

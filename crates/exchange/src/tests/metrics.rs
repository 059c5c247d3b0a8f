use prometheus_client::encoding::text::encode;

use super::*;

#[test]
fn test_counters_are_shared_between_clones() {
    let metrics = ExchangeMetrics::default();
    let clone = metrics.clone();

    clone.record_sent(10);
    clone.record_sent(5);
    clone.record_received(7);
    clone.record_block_received();
    clone.record_block_rejected();
    clone.record_unwanted_block();

    assert_eq!(metrics.sent_bytes(), 15);
    assert_eq!(metrics.received_bytes(), 7);
    assert_eq!(metrics.blocks_received(), 1);
    assert_eq!(metrics.blocks_rejected(), 1);
    assert_eq!(metrics.unwanted_blocks(), 1);
}

#[test]
fn test_registered_counters_are_exported() {
    let mut registry = Registry::default();
    let metrics = ExchangeMetrics::new(&mut registry);
    metrics.record_sent(42);

    let mut out = String::new();
    encode(&mut out, &registry).unwrap();

    assert!(out.contains("exchange_sent_bytes_total 42"));
    assert!(out.contains("exchange_unwanted_blocks_total 0"));
}

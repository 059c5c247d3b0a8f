use std::fs;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use super::*;

fn config(dir: &TempDir, max_file_size: u64) -> TraceConfig {
    let dir = Utf8PathBuf::try_from(dir.path().join("traces")).unwrap();

    TraceConfig::new(true, dir, max_file_size, Duration::from_millis(10))
}

fn read_lines(config: &TraceConfig) -> (usize, Vec<String>) {
    let mut files = 0;
    let mut lines = Vec::new();

    for entry in fs::read_dir(&config.dir).unwrap() {
        let path = entry.unwrap().path();
        assert!(path.to_string_lossy().ends_with(".trace.log"));

        let content = fs::read_to_string(path).unwrap();
        if !content.is_empty() {
            files += 1;
        }
        lines.extend(content.lines().map(str::to_owned));
    }

    (files, lines)
}

#[test]
fn test_trace_ids_are_random_hex() {
    let first = TraceLog::new_trace_id();
    let second = TraceLog::new_trace_id();

    assert_eq!(first.len(), 32);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(first, second);
}

#[test]
fn test_event_classification() {
    let reply = Message::traced("t");
    let request = Message {
        wantlist: Some(trove_network_primitives::messages::Wantlist {
            entries: vec![trove_network_primitives::messages::Entry::default()],
            full: false,
        }),
        ..Message::traced("t")
    };

    assert_eq!(TraceEvent::sent(&request), TraceEvent::ClientStart);
    assert_eq!(TraceEvent::sent(&reply), TraceEvent::ServerEnd);
    assert_eq!(TraceEvent::received(&request), TraceEvent::ServerStart);
    assert_eq!(TraceEvent::received(&reply), TraceEvent::ClientEnd);
    assert_eq!(TraceEvent::ServerStart.to_string(), "BitswapServerStart");
}

#[tokio::test]
async fn test_disabled_log_records_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, 1_024);
    config.enabled = false;

    let log = TraceLog::open(&config, "node").await.unwrap();
    log.record("abc", &"peer", TraceEvent::ClientStart, &"");
    log.shutdown().await;

    assert!(!log.is_enabled());
    assert!(!config.dir.exists());
}

#[tokio::test]
async fn test_zero_flush_interval_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, 1_024);
    config.flush_interval = Duration::ZERO;

    let err = TraceLog::open(&config, "node").await.unwrap_err();

    assert!(err.to_string().contains("flush_interval_ms"));
    assert!(!config.dir.exists());
}

#[tokio::test]
async fn test_lines_are_written_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 1_024 * 1_024);

    let log = TraceLog::open(&config, "node-a").await.unwrap();
    log.record("abc", &"peer-b", TraceEvent::ServerStart, &"entries=1");
    log.record("", &"peer-b", TraceEvent::ServerEnd, &"untraced");
    log.record_message(&"peer-b", &Message::traced("abc"), TraceEvent::ServerEnd);
    log.shutdown().await;

    let (_, lines) = read_lines(&config);
    assert_eq!(lines.len(), 2);

    let fields: Vec<_> = lines[0].split('\t').collect();
    assert_eq!(fields.len(), 7);
    assert_eq!(fields[0], "abc");
    assert_eq!(fields[1], "node-a");
    assert_eq!(fields[2], "peer-b");
    assert!(fields[3].parse::<i64>().unwrap() > 0);
    assert!(chrono::DateTime::parse_from_rfc3339(fields[4]).is_ok());
    assert_eq!(fields[5], "BitswapServerStart");
    assert_eq!(fields[6], "entries=1");

    assert!(lines[1].ends_with("BitswapServerEnd\tentries=0 presences=0 blocks=0"));
}

#[tokio::test]
async fn test_records_after_shutdown_are_dropped() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 1_024 * 1_024);

    let log = TraceLog::open(&config, "node").await.unwrap();
    log.shutdown().await;
    log.record("abc", &"peer", TraceEvent::ClientStart, &"");
    log.shutdown().await;

    let (_, lines) = read_lines(&config);
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_files_rotate_past_the_size_cap() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 1);

    let log = TraceLog::open(&config, "node").await.unwrap();
    for trace_id in ["a", "b", "c"] {
        log.record(trace_id, &"peer", TraceEvent::ClientStart, &"");
    }
    log.shutdown().await;

    let (files, lines) = read_lines(&config);
    assert_eq!(files, 3);
    assert_eq!(lines.len(), 3);
}

use bytes::Bytes;
use camino::Utf8PathBuf;
use futures_util::{SinkExt, StreamExt};
use tempfile::TempDir;
use trove_network_primitives::messages::{Block, Entry, WantType, Wantlist};
use trove_network_primitives::stream::{Stream as FramedStream, MAX_FRAME_SIZE};
use trove_primitives::block::HashedBlock;
use trove_primitives::cid::{raw_cid, RAW};
use trove_primitives::want::Want;
use trove_store::{BlockStore, MemoryBlockStore};

use super::*;
use crate::auth::AllowAll;
use crate::config::{ExchangeConfig, TraceConfig};

fn exchange(store: MemoryBlockStore) -> Exchange {
    Exchange::new(
        &ExchangeConfig::default(),
        Arc::new(store),
        Arc::new(AllowAll),
        Arc::new(TraceLog::disabled()),
        ExchangeMetrics::default(),
    )
}

#[tokio::test]
async fn test_send_counts_encoded_bytes() {
    let (local, remote) = tokio::io::duplex(4_096);
    let metrics = ExchangeMetrics::default();
    let mut connection = ExchangeConnection::new(
        PeerId::random(),
        FramedStream::from_io(local),
        metrics.clone(),
        Arc::new(TraceLog::disabled()),
    );
    let mut remote = FramedStream::from_io(remote);

    let message = Message {
        payload: vec![Block::new(&HashedBlock::raw(&b"hello"[..]), None)],
        ..Message::traced("abc")
    };
    let size = message.encoded_len();

    MessageSink::send(&mut connection, message.clone())
        .await
        .unwrap();

    assert_eq!(metrics.sent_bytes(), size as u64);
    assert_eq!(remote.next().await.unwrap().unwrap(), message);

    remote.send(Message::traced("xyz")).await.unwrap();
    let received = connection.recv().await.unwrap().unwrap();

    assert_eq!(received, Message::traced("xyz"));
    assert_eq!(metrics.received_bytes(), received.encoded_len() as u64);

    connection.close().await.unwrap();
    assert!(remote.next().await.is_none());
}

#[tokio::test]
async fn test_only_delivered_frames_are_traced() {
    let dir = TempDir::new().unwrap();
    let trace_dir = Utf8PathBuf::try_from(dir.path().to_owned()).unwrap();
    let tracer = TraceLog::open(&TraceConfig::enabled_in(trace_dir.clone()), "node")
        .await
        .unwrap();

    let (local, _remote) = tokio::io::duplex(4_096);
    let metrics = ExchangeMetrics::default();
    let mut connection = ExchangeConnection::new(
        PeerId::random(),
        FramedStream::from_io(local),
        metrics.clone(),
        Arc::new(tracer),
    );

    let delivered = Message {
        payload: vec![Block::new(&HashedBlock::raw(&b"hello"[..]), None)],
        ..Message::traced("ok")
    };
    let oversized = Message {
        payload: vec![Block {
            data: Bytes::from(vec![0_u8; MAX_FRAME_SIZE]),
            ..Block::default()
        }],
        ..Message::traced("too-big")
    };
    let delivered_size = delivered.encoded_len();

    MessageSink::send(&mut connection, delivered).await.unwrap();
    assert!(MessageSink::send(&mut connection, oversized).await.is_err());

    connection.tracer.shutdown().await;

    let mut trace_ids = Vec::new();
    for entry in std::fs::read_dir(&trace_dir).unwrap() {
        let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
        for line in content.lines() {
            trace_ids.push(line.split('\t').next().unwrap().to_owned());
        }
    }

    assert_eq!(trace_ids, ["ok"]);
    assert_eq!(metrics.sent_bytes(), delivered_size as u64);
}

#[tokio::test]
async fn test_drive_serves_and_unregisters() {
    let store = MemoryBlockStore::default();
    let cid = store.put(Bytes::from_static(b"hello"), RAW).await.unwrap();
    let exchange = exchange(store);
    let peer_id = PeerId::random();

    let (local, remote) = tokio::io::duplex(4_096);
    let mut remote = FramedStream::from_io(remote);

    let client = async {
        let request = Message {
            wantlist: Some(Wantlist {
                entries: vec![Entry::want(&Want::new(cid), WantType::Block, true)],
                full: false,
            }),
            ..Message::traced("abc")
        };
        remote.send(request).await.unwrap();

        let reply = remote.next().await.unwrap().unwrap();
        drop(remote);
        reply
    };

    let (driven, reply) = tokio::join!(
        drive(&exchange, peer_id, FramedStream::from_io(local)),
        client
    );

    driven.unwrap();

    assert_eq!(reply.trace_id, "abc");
    assert_eq!(reply.payload.len(), 1);
    assert_eq!(reply.payload[0].data, Bytes::from_static(b"hello"));
    assert!(exchange.connected().is_empty());
    assert!(exchange.metrics().sent_bytes() > 0);
}

#[tokio::test]
async fn test_drive_forwards_queued_wants() {
    let exchange = exchange(MemoryBlockStore::default());
    let peer_id = PeerId::random();
    let cid = raw_cid(b"wanted");

    let (local, remote) = tokio::io::duplex(4_096);
    let mut remote = FramedStream::from_io(remote);

    let client = async {
        while exchange.connected().is_empty() {
            tokio::task::yield_now().await;
        }

        let _future = exchange.want_block(Want::new(cid), &[]).await;

        let frame = remote.next().await.unwrap().unwrap();
        drop(remote);
        frame
    };

    let (driven, frame) = tokio::join!(
        drive(&exchange, peer_id, FramedStream::from_io(local)),
        client
    );

    driven.unwrap();

    let entries = frame.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].to_want().unwrap(), Want::new(cid));
    assert_eq!(entries[0].want_type(), WantType::Block);
    assert!(entries[0].send_dont_have);
}

#[tokio::test]
async fn test_replaced_connection_stays_registered() {
    let exchange = exchange(MemoryBlockStore::default());
    let peer_id = PeerId::random();

    let (local, remote) = tokio::io::duplex(4_096);

    let replace = async {
        while exchange.connected().is_empty() {
            tokio::task::yield_now().await;
        }

        let (newer, queued) = mpsc::channel(1);
        exchange.add_connection(peer_id, newer);
        drop(remote);
        queued
    };

    let (driven, _queued) = tokio::join!(
        drive(&exchange, peer_id, FramedStream::from_io(local)),
        replace
    );

    driven.unwrap();

    assert_eq!(exchange.connected(), [peer_id]);
}

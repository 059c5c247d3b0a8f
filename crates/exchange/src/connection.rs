#[cfg(test)]
#[path = "tests/connection.rs"]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result as EyreResult;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use libp2p_identity::PeerId;
use prost::Message as _;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use trove_network_primitives::messages::Message;
use trove_network_primitives::stream::CodecError;

use crate::batcher::MessageSink;
use crate::metrics::ExchangeMetrics;
use crate::trace::{self, TraceEvent, TraceLog};
use crate::Exchange;

/// Frames queued for a peer before `send_wants` starts waiting.
pub const OUTBOX_CAPACITY: usize = 64;

/// One duplex channel to a remote peer, as seen by the engine.
#[async_trait]
pub trait Connection: MessageSink {
    fn peer_id(&self) -> PeerId;

    async fn close(&mut self) -> EyreResult<()>;
}

/// Wraps a framed stream with byte accounting and trace records.
#[derive(Debug)]
pub struct ExchangeConnection<S> {
    peer_id: PeerId,
    stream: S,
    metrics: ExchangeMetrics,
    tracer: Arc<TraceLog>,
}

impl<S> ExchangeConnection<S> {
    pub const fn new(
        peer_id: PeerId,
        stream: S,
        metrics: ExchangeMetrics,
        tracer: Arc<TraceLog>,
    ) -> Self {
        Self {
            peer_id,
            stream,
            metrics,
            tracer,
        }
    }
}

impl<S> ExchangeConnection<S>
where
    S: Stream<Item = Result<Message, CodecError>> + Unpin + Send,
{
    /// Next inbound frame, or `None` once the peer has closed its side.
    pub async fn recv(&mut self) -> Option<Result<Message, CodecError>> {
        let message = match self.stream.next().await? {
            Ok(message) => message,
            Err(err) => return Some(Err(err)),
        };

        self.metrics.record_received(message.encoded_len());
        self.tracer
            .record_message(&self.peer_id, &message, TraceEvent::received(&message));

        Some(Ok(message))
    }
}

#[async_trait]
impl<S> MessageSink for ExchangeConnection<S>
where
    S: Sink<Message, Error = CodecError> + Unpin + Send,
{
    async fn send(&mut self, message: Message) -> EyreResult<()> {
        let size = message.encoded_len();
        let event = TraceEvent::sent(&message);

        let trace_id = message.trace_id.clone();
        let summary = trace::summarise(&message);

        self.stream.send(message).await?;
        self.metrics.record_sent(size);
        self.tracer.record(&trace_id, &self.peer_id, event, &summary);

        Ok(())
    }
}

#[async_trait]
impl<S> Connection for ExchangeConnection<S>
where
    S: Sink<Message, Error = CodecError> + Unpin + Send,
{
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn close(&mut self) -> EyreResult<()> {
        SinkExt::close(&mut self.stream).await?;

        Ok(())
    }
}

/// Runs one peer's connection until either side stops.
///
/// Registers the peer with `exchange`, answers every inbound frame, and
/// writes whatever the exchange queues for the peer. On exit the peer is
/// unregistered (unless a newer connection has replaced it) and the stream
/// is closed.
pub async fn drive<S>(exchange: &Exchange, peer_id: PeerId, stream: S) -> EyreResult<()>
where
    S: Stream<Item = Result<Message, CodecError>> + Sink<Message, Error = CodecError> + Unpin + Send,
{
    let (outbox, mut queued) = mpsc::channel(OUTBOX_CAPACITY);
    let registered = outbox.downgrade();

    exchange.add_connection(peer_id, outbox);

    let mut connection = ExchangeConnection::new(
        peer_id,
        stream,
        exchange.metrics().clone(),
        Arc::clone(exchange.tracer()),
    );

    debug!(%peer_id, "connection opened");

    let result = loop {
        tokio::select! {
            inbound = connection.recv() => match inbound {
                Some(Ok(message)) => {
                    if let Err(err) = exchange.receive_message(message, &mut connection).await {
                        break Err(err);
                    }
                }
                Some(Err(err)) => break Err(err.into()),
                None => break Ok(()),
            },
            outbound = queued.recv() => match outbound {
                Some(message) => {
                    if let Err(err) = connection.send(message).await {
                        break Err(err);
                    }
                }
                None => break Ok(()),
            },
        }
    };

    if let Some(outbox) = registered.upgrade() {
        let _ = exchange.remove_connection_if_same(&peer_id, &outbox);
    }

    if let Err(err) = connection.close().await {
        warn!(%peer_id, ?err, "failed to close connection");
    }

    debug!(%peer_id, ok = result.is_ok(), "connection closed");

    result
}

#[cfg(test)]
#[path = "tests/stream.rs"]
mod tests;

use core::pin::Pin;
use core::task::{Context, Poll};

use futures_util::{Sink as FuturesSink, SinkExt, Stream as FuturesStream, StreamExt};
use libp2p::{Stream as P2pStream, StreamProtocol};
use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio_util::codec::Framed;
use tokio_util::compat::{Compat, FuturesAsyncReadCompatExt};

use crate::messages::Message;

mod codec;

pub use codec::{CodecError, MessageCodec};

/// Largest frame either side will read or write.
pub const MAX_FRAME_SIZE: usize = 8 * 1_024 * 1_024;

pub const BITSWAP_PROTOCOL: StreamProtocol = StreamProtocol::new("/ipfs/bitswap/1.2.0");

/// A framed, bidirectional exchange stream.
///
/// Defaults to a libp2p substream; any tokio byte stream works for local
/// transports and tests.
#[derive(Debug)]
pub struct Stream<T = Compat<P2pStream>> {
    inner: Framed<BufStream<T>, MessageCodec>,
}

impl Stream {
    #[must_use]
    pub fn new(stream: P2pStream) -> Self {
        Self::from_io(stream.compat())
    }
}

impl<T: AsyncRead + AsyncWrite> Stream<T> {
    #[must_use]
    pub fn from_io(io: T) -> Self {
        let stream = BufStream::new(io);
        let stream = Framed::new(stream, MessageCodec::new(MAX_FRAME_SIZE));
        Self { inner: stream }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> FuturesStream for Stream<T> {
    type Item = Result<Message, CodecError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> FuturesSink<Message> for Stream<T> {
    type Error = CodecError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.inner.start_send_unpin(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx)
    }
}

#[cfg(test)]
#[path = "../tests/codec.rs"]
mod tests;

use std::io;

use bytes::{Bytes, BytesMut};
use prost::Message as _;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::messages::Message;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error(transparent)]
    StdIo(#[from] io::Error),

    #[error("malformed frame: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

/// Length-prefixed protobuf frames.
#[derive(Debug)]
pub struct MessageCodec {
    max_size: usize,
    length_codec: LengthDelimitedCodec,
}

impl MessageCodec {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            length_codec: LengthDelimitedCodec::builder()
                .max_frame_length(max_size)
                .new_codec(),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.length_codec.decode(src)? else {
            return Ok(None);
        };

        Ok(Some(Message::decode(frame.freeze())?))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = item.encoded_len();

        if size > self.max_size {
            return Err(CodecError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        self.length_codec
            .encode(Bytes::from(item.encode_to_vec()), dst)
            .map_err(CodecError::StdIo)
    }
}

#[cfg(test)]
#[path = "tests/messages.rs"]
mod tests;

use bytes::Bytes;
use prost::encoding::{encoded_len_varint, key_len};
use trove_primitives::block::{BlockError, HashedBlock};
use trove_primitives::cid::{Cid, CidError, Prefix};
use trove_primitives::want::{AuthToken, Want};

const WANTLIST_TAG: u32 = 1;
const ENTRIES_TAG: u32 = 1;
const PAYLOAD_TAG: u32 = 3;
const BLOCK_PRESENCES_TAG: u32 = 4;
const TRACE_ID_TAG: u32 = 6;

/// One frame of the exchange protocol.
///
/// Field numbers follow bitswap 1.2.0; tag 2 (the legacy block list) is
/// never sent. `trace_id` correlates a request with the frames it caused.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(message, optional, tag = "1")]
    pub wantlist: Option<Wantlist>,
    #[prost(message, repeated, tag = "3")]
    pub payload: Vec<Block>,
    #[prost(message, repeated, tag = "4")]
    pub block_presences: Vec<BlockPresence>,
    #[prost(int32, tag = "5")]
    pub pending_bytes: i32,
    #[prost(string, tag = "6")]
    pub trace_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Wantlist {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<Entry>,
    #[prost(bool, tag = "2")]
    pub full: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Entry {
    #[prost(bytes = "vec", tag = "1")]
    pub block: Vec<u8>,
    #[prost(int32, tag = "2")]
    pub priority: i32,
    #[prost(bool, tag = "3")]
    pub cancel: bool,
    #[prost(enumeration = "WantType", tag = "4")]
    pub want_type: i32,
    #[prost(bool, tag = "5")]
    pub send_dont_have: bool,
    #[prost(bytes = "vec", tag = "6")]
    pub auth: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Block {
    #[prost(bytes = "vec", tag = "1")]
    pub prefix: Vec<u8>,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: Bytes,
    #[prost(bytes = "vec", tag = "3")]
    pub auth: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BlockPresence {
    #[prost(bytes = "vec", tag = "1")]
    pub cid: Vec<u8>,
    #[prost(enumeration = "BlockPresenceType", tag = "2")]
    pub r#type: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub auth: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WantType {
    Block = 0,
    Have = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum BlockPresenceType {
    Have = 0,
    DontHave = 1,
}

fn decode_cid(bytes: &[u8]) -> Result<Cid, CidError> {
    Ok(Cid::try_from(bytes)?)
}

impl Message {
    /// A frame carrying nothing but `trace_id`.
    #[must_use]
    pub fn traced(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Self::default()
        }
    }

    /// Whether the frame carries no wants, blocks or presences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
            && self.block_presences.is_empty()
            && self.wantlist.as_ref().map_or(true, |w| w.entries.is_empty())
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        self.wantlist.as_ref().map_or(&[][..], |w| &w.entries)
    }

    /// Encoded size of a frame holding only `trace_id`.
    #[must_use]
    pub fn base_len(trace_id: &str) -> usize {
        if trace_id.is_empty() {
            return 0;
        }

        key_len(TRACE_ID_TAG) + encoded_len_varint(trace_id.len() as u64) + trace_id.len()
    }

    /// Encoded size of the wantlist field once it holds `entries_len` bytes
    /// of entries.
    #[must_use]
    pub fn wantlist_len(entries_len: usize) -> usize {
        key_len(WANTLIST_TAG) + encoded_len_varint(entries_len as u64) + entries_len
    }
}

impl Entry {
    #[must_use]
    pub fn want(want: &Want, want_type: WantType, send_dont_have: bool) -> Self {
        Self {
            block: want.cid.to_bytes(),
            priority: 1,
            cancel: false,
            want_type: want_type.into(),
            send_dont_have,
            auth: want.auth_bytes().to_vec(),
        }
    }

    #[must_use]
    pub fn cancel(want: &Want) -> Self {
        Self {
            cancel: true,
            ..Self::want(want, WantType::Block, false)
        }
    }

    /// The want this entry refers to.
    pub fn to_want(&self) -> Result<Want, CidError> {
        Ok(Want::from_wire(decode_cid(&self.block)?, &self.auth))
    }

    /// Bytes this entry adds inside a wantlist.
    #[must_use]
    pub fn field_len(&self) -> usize {
        prost::encoding::message::encoded_len(ENTRIES_TAG, self)
    }
}

impl Block {
    #[must_use]
    pub fn new(block: &HashedBlock, auth: Option<&AuthToken>) -> Self {
        Self::from_parts(block.cid(), block.data().clone(), auth)
    }

    /// Builds a block record from bytes the caller already trusts to match
    /// `cid`, such as those read back from the local store.
    #[must_use]
    pub fn from_parts(cid: &Cid, data: Bytes, auth: Option<&AuthToken>) -> Self {
        Self {
            prefix: Prefix::of(cid).to_bytes(),
            data,
            auth: auth.map(|a| a.as_bytes().to_vec()).unwrap_or_default(),
        }
    }

    /// Verifies the payload by hashing it under its prefix.
    pub fn to_hashed(&self) -> Result<HashedBlock, BlockError> {
        let prefix = Prefix::from_bytes(&self.prefix)?;

        HashedBlock::from_prefix(&prefix, self.data.clone())
    }

    #[must_use]
    pub fn auth(&self) -> Option<AuthToken> {
        AuthToken::from_wire(&self.auth)
    }

    /// Bytes this block adds to a frame.
    #[must_use]
    pub fn field_len(&self) -> usize {
        prost::encoding::message::encoded_len(PAYLOAD_TAG, self)
    }
}

impl BlockPresence {
    #[must_use]
    pub fn new(want: &Want, kind: BlockPresenceType) -> Self {
        Self {
            cid: want.cid.to_bytes(),
            r#type: kind.into(),
            auth: want.auth_bytes().to_vec(),
        }
    }

    #[must_use]
    pub fn have(want: &Want) -> Self {
        Self::new(want, BlockPresenceType::Have)
    }

    #[must_use]
    pub fn dont_have(want: &Want) -> Self {
        Self::new(want, BlockPresenceType::DontHave)
    }

    pub fn to_want(&self) -> Result<Want, CidError> {
        Ok(Want::from_wire(decode_cid(&self.cid)?, &self.auth))
    }

    /// Bytes this presence adds to a frame.
    #[must_use]
    pub fn field_len(&self) -> usize {
        prost::encoding::message::encoded_len(BLOCK_PRESENCES_TAG, self)
    }
}

#[cfg(test)]
#[path = "tests/block.rs"]
mod tests;

use core::fmt;

use bytes::Bytes;
use thiserror::Error;

use crate::cid::{self, Cid, CidError, Prefix};

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block bytes do not hash to {cid}")]
    HashMismatch { cid: Cid },

    #[error(transparent)]
    Cid(#[from] CidError),
}

/// A block whose bytes are known to hash to its CID.
///
/// Every constructor checks the digest, so holding a `HashedBlock` is proof
/// the content was verified.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedBlock {
    cid: Cid,
    data: Bytes,
}

impl HashedBlock {
    pub fn new(cid: Cid, data: impl Into<Bytes>) -> Result<Self, BlockError> {
        let data = data.into();

        if !cid::matches(&cid, &data) {
            return Err(BlockError::HashMismatch { cid });
        }

        Ok(Self { cid, data })
    }

    /// Rebuilds a block received as `prefix` + bytes, recomputing the digest.
    pub fn from_prefix(prefix: &Prefix, data: impl Into<Bytes>) -> Result<Self, BlockError> {
        let data = data.into();
        let cid = prefix.to_cid(&data)?;

        Ok(Self { cid, data })
    }

    /// Wraps `data` as a raw-codec CIDv1 block.
    #[must_use]
    pub fn raw(data: impl Into<Bytes>) -> Self {
        let data = data.into();

        Self {
            cid: cid::raw_cid(&data),
            data,
        }
    }

    #[must_use]
    pub const fn cid(&self) -> &Cid {
        &self.cid
    }

    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    #[must_use]
    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.cid, self.data)
    }
}

impl fmt::Debug for HashedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedBlock")
            .field("cid", &self.cid.to_string())
            .field("size", &self.data.len())
            .finish()
    }
}

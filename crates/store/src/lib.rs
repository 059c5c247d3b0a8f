//! Block storage consumed by the exchange.
//!
//! Stores are keyed by CID and never trust a caller-supplied key: `put`
//! derives the CID from the bytes it is given, and `put_block` only accepts
//! blocks already verified against theirs.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use camino::Utf8Path;
use eyre::Result as EyreResult;
use trove_primitives::block::HashedBlock;
use trove_primitives::cid::Cid;

pub mod fs;
pub mod memory;

pub use fs::FileSystemBlockStore;
pub use memory::MemoryBlockStore;

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn has(&self, cid: &Cid) -> EyreResult<bool>;

    async fn get(&self, cid: &Cid) -> EyreResult<Option<Bytes>>;

    /// Stores `data` under the CIDv1 of its sha2-256 digest and `codec`.
    async fn put(&self, data: Bytes, codec: u64) -> EyreResult<Cid>;

    /// Stores a verified block under its own CID, whatever its version.
    async fn put_block(&self, block: &HashedBlock) -> EyreResult<()>;
}

#[async_trait]
impl<T: BlockStore + ?Sized> BlockStore for Arc<T> {
    async fn has(&self, cid: &Cid) -> EyreResult<bool> {
        (**self).has(cid).await
    }

    async fn get(&self, cid: &Cid) -> EyreResult<Option<Bytes>> {
        (**self).get(cid).await
    }

    async fn put(&self, data: Bytes, codec: u64) -> EyreResult<Cid> {
        (**self).put(data, codec).await
    }

    async fn put_block(&self, block: &HashedBlock) -> EyreResult<()> {
        (**self).put_block(block).await
    }
}

/// Opens a filesystem store rooted at `path`, or an in-memory one if no path
/// is given.
pub async fn open(path: Option<&Utf8Path>) -> EyreResult<Arc<dyn BlockStore>> {
    let Some(path) = path else {
        return Ok(Arc::new(MemoryBlockStore::default()));
    };

    Ok(Arc::new(FileSystemBlockStore::new(path).await?))
}

#[cfg(test)]
#[path = "tests/memory.rs"]
mod tests;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use eyre::Result as EyreResult;
use trove_primitives::block::HashedBlock;
use trove_primitives::cid::{self, Cid};

use crate::BlockStore;

#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: DashMap<Cid, Bytes>,
}

impl MemoryBlockStore {
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn has(&self, cid: &Cid) -> EyreResult<bool> {
        Ok(self.blocks.contains_key(cid))
    }

    async fn get(&self, cid: &Cid) -> EyreResult<Option<Bytes>> {
        Ok(self.blocks.get(cid).map(|entry| entry.value().clone()))
    }

    async fn put(&self, data: Bytes, codec: u64) -> EyreResult<Cid> {
        let cid = cid::cid_of(codec, &data);

        drop(self.blocks.entry(cid).or_insert(data));

        Ok(cid)
    }

    async fn put_block(&self, block: &HashedBlock) -> EyreResult<()> {
        drop(
            self.blocks
                .entry(*block.cid())
                .or_insert_with(|| block.data().clone()),
        );

        Ok(())
    }
}

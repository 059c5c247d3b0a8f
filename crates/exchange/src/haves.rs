#[cfg(test)]
#[path = "tests/haves.rs"]
mod tests;

use std::collections::HashMap;

use dashmap::DashMap;
use libp2p_identity::PeerId;
use tracing::debug;
use trove_primitives::want::Want;

/// Which peer last told us it holds a block we want.
///
/// Entries are routing hints only; they are never expired and the peer may
/// have dropped the block since.
#[derive(Debug, Default)]
pub struct HaveTable {
    haves: DashMap<Want, PeerId>,
}

impl HaveTable {
    pub fn record(&self, want: Want, peer_id: PeerId) {
        debug!(%peer_id, %want, "peer has wanted block");

        let _ = self.haves.insert(want, peer_id);
    }

    #[must_use]
    pub fn lookup(&self, want: &Want) -> Option<PeerId> {
        self.haves.get(want).map(|peer| *peer)
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<Want, PeerId> {
        self.haves
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.haves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.haves.is_empty()
    }
}

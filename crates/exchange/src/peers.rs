use dashmap::DashMap;
use libp2p_identity::PeerId;
use tokio::sync::mpsc;
use tracing::debug;
use trove_network_primitives::messages::Message;

/// Queue of frames waiting to be written to one peer.
pub type Outbox = mpsc::Sender<Message>;

/// Currently connected peers and their outboxes.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    outboxes: DashMap<PeerId, Outbox>,
}

impl PeerRegistry {
    /// Registers `peer_id`, replacing the outbox of any earlier connection.
    pub fn add(&self, peer_id: PeerId, outbox: Outbox) {
        if self.outboxes.insert(peer_id, outbox).is_some() {
            debug!(%peer_id, "replaced existing connection");
        }
    }

    pub fn remove(&self, peer_id: &PeerId) -> Option<Outbox> {
        self.outboxes.remove(peer_id).map(|(_, outbox)| outbox)
    }

    /// Removes `peer_id` only while it is still registered with `outbox`.
    pub fn remove_if_same(&self, peer_id: &PeerId, outbox: &Outbox) -> bool {
        self.outboxes
            .remove_if(peer_id, |_, current| current.same_channel(outbox))
            .is_some()
    }

    #[must_use]
    pub fn outbox(&self, peer_id: &PeerId) -> Option<Outbox> {
        self.outboxes.get(peer_id).map(|outbox| outbox.clone())
    }

    #[must_use]
    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.outboxes.contains_key(peer_id)
    }

    #[must_use]
    pub fn connected(&self) -> Vec<PeerId> {
        self.outboxes.iter().map(|entry| *entry.key()).collect()
    }
}

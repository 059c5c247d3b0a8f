//! Block exchange engine.
//!
//! An [`Exchange`] answers remote wantlists from the local block store,
//! resolves local wants when verified blocks arrive, remembers which peers
//! claim to hold blocks we are waiting for, and packs replies into frames no
//! larger than the configured message size.

use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use eyre::Result as EyreResult;
use futures_util::future::join_all;
use libp2p_identity::PeerId;
use tracing::{debug, warn};
use trove_network_primitives::messages::{
    Block, BlockPresence, BlockPresenceType, Entry, Message, WantType,
};
use trove_network_primitives::stream::MAX_FRAME_SIZE;
use trove_primitives::block::HashedBlock;
use trove_primitives::cid::{peer_cid, Cid};
use trove_primitives::want::Want;
use trove_store::BlockStore;

pub mod auth;
pub mod batcher;
pub mod config;
pub mod connection;
pub mod haves;
pub mod metrics;
pub mod peers;
pub mod trace;
pub mod wants;

use auth::Authoriser;
use batcher::build_and_send;
use config::ExchangeConfig;
use connection::Connection;
use haves::HaveTable;
use metrics::ExchangeMetrics;
use peers::{Outbox, PeerRegistry};
use trace::TraceLog;
use wants::{WantFuture, WantTable};

#[cfg(test)]
#[path = "tests/exchange.rs"]
mod tests;

/// A remote want that survived cancellation within its wantlist.
#[derive(Debug)]
struct Request {
    want: Want,
    want_type: WantType,
    send_dont_have: bool,
}

#[derive(Debug)]
enum Reply {
    Presence(BlockPresence),
    Block(Block),
}

pub struct Exchange {
    max_message_size: usize,
    store: Arc<dyn BlockStore>,
    authoriser: Arc<dyn Authoriser>,
    tracer: Arc<TraceLog>,
    metrics: ExchangeMetrics,
    wants: WantTable,
    haves: HaveTable,
    peers: PeerRegistry,
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("max_message_size", &self.max_message_size)
            .field("wants", &self.wants.len())
            .field("haves", &self.haves.len())
            .field("peers", &self.peers)
            .finish_non_exhaustive()
    }
}

impl Exchange {
    pub fn new(
        config: &ExchangeConfig,
        store: Arc<dyn BlockStore>,
        authoriser: Arc<dyn Authoriser>,
        tracer: Arc<TraceLog>,
        metrics: ExchangeMetrics,
    ) -> Self {
        let max_message_size = config.max_message_size.min(MAX_FRAME_SIZE);

        if max_message_size != config.max_message_size {
            warn!(
                configured = config.max_message_size,
                max = MAX_FRAME_SIZE,
                "max message size exceeds the frame limit, clamping"
            );
        }

        Self {
            max_message_size,
            store,
            authoriser,
            tracer,
            metrics,
            wants: WantTable::new(config.want_recency),
            haves: HaveTable::default(),
            peers: PeerRegistry::default(),
        }
    }

    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    #[must_use]
    pub const fn metrics(&self) -> &ExchangeMetrics {
        &self.metrics
    }

    #[must_use]
    pub const fn tracer(&self) -> &Arc<TraceLog> {
        &self.tracer
    }

    #[must_use]
    pub fn store(&self) -> &dyn BlockStore {
        &*self.store
    }

    pub fn add_connection(&self, peer_id: PeerId, outbox: Outbox) {
        self.peers.add(peer_id, outbox);
    }

    pub fn remove_connection(&self, peer_id: &PeerId) -> bool {
        self.peers.remove(peer_id).is_some()
    }

    /// Unregisters `peer_id` only if it still uses `outbox`.
    pub fn remove_connection_if_same(&self, peer_id: &PeerId, outbox: &Outbox) -> bool {
        self.peers.remove_if_same(peer_id, outbox)
    }

    #[must_use]
    pub fn connected(&self) -> Vec<PeerId> {
        self.peers.connected()
    }

    /// Registers interest in `want` without telling anyone. Concurrent
    /// callers asking for the same want share one future.
    pub fn register_want(&self, want: Want) -> WantFuture {
        self.wants.register(want)
    }

    /// Registers `want` and advertises it to `peers`, or to every connected
    /// peer when `peers` is empty.
    pub async fn want_block(&self, want: Want, peers: &[PeerId]) -> WantFuture {
        let future = self.wants.register(want.clone());
        let entries = vec![Entry::want(&want, WantType::Block, true)];

        let _ = self.send_entries(&self.targets(peers), &entries).await;

        future
    }

    #[must_use]
    pub fn has_wants(&self) -> bool {
        self.wants.has_pending()
    }

    /// Pending wants to advertise to `peers`; a single peer only hears about
    /// recent ones.
    #[must_use]
    pub fn wants(&self, peers: &[PeerId]) -> Vec<Want> {
        self.wants.list(peers.len())
    }

    #[must_use]
    pub fn haves(&self) -> HashMap<Want, PeerId> {
        self.haves.snapshot()
    }

    /// Sends every pending want to `peers`, or to every connected peer when
    /// `peers` is empty. Returns how many peers were sent a wantlist.
    pub async fn send_wants(&self, peers: &[PeerId]) -> usize {
        let targets = self.targets(peers);

        let entries: Vec<_> = self
            .wants
            .list(targets.len())
            .iter()
            .map(|want| Entry::want(want, WantType::Block, true))
            .collect();

        self.send_entries(&targets, &entries).await
    }

    /// Fetches `wants`, from the local store where possible and from `peers`
    /// otherwise. Blocks fetched from the network are stored locally when
    /// `add_to_local` is set.
    ///
    /// Waits for as long as it takes; wrap in a timeout to give up.
    pub async fn get_blocks(
        &self,
        wants: Vec<Want>,
        peers: &[PeerId],
        add_to_local: bool,
    ) -> EyreResult<Vec<HashedBlock>> {
        let mut found = Vec::with_capacity(wants.len());
        let mut pending = Vec::new();

        for (index, want) in wants.into_iter().enumerate() {
            if let Some(data) = self.fetch(&want.cid).await {
                match HashedBlock::new(want.cid, data) {
                    Ok(block) => {
                        found.push(Some(block));
                        continue;
                    }
                    Err(err) => warn!(cid = %want.cid, %err, "local copy is corrupt, refetching"),
                }
            }

            found.push(None);
            pending.push((index, self.wants.register(want)));
        }

        if pending.is_empty() {
            return Ok(found.into_iter().flatten().collect());
        }

        let _ = self.send_wants(peers).await;

        let (indices, futures): (Vec<_>, Vec<_>) = pending.into_iter().unzip();

        for (index, result) in indices.into_iter().zip(join_all(futures).await) {
            let block = result?;

            if add_to_local {
                self.store.put_block(&block).await?;
            }

            found[index] = Some(block);
        }

        Ok(found.into_iter().flatten().collect())
    }

    /// Handles one inbound frame from `connection`'s peer and writes the
    /// replies, if any, back to it.
    ///
    /// Store and authoriser failures are logged and answered as if the block
    /// were absent. Only failing to send a reply is an error.
    pub async fn receive_message<C>(&self, message: Message, connection: &mut C) -> EyreResult<()>
    where
        C: Connection + ?Sized,
    {
        let peer_id = connection.peer_id();
        let requester = peer_cid(&peer_id)?;

        let Message {
            wantlist,
            payload,
            block_presences,
            trace_id,
            ..
        } = message;

        let requests = requests(&peer_id, wantlist.map(|w| w.entries).unwrap_or_default());

        let replies = join_all(
            requests
                .iter()
                .map(|request| self.serve(&requester, request)),
        )
        .await;

        for block in payload {
            self.accept_block(&peer_id, &block);
        }

        for presence in &block_presences {
            self.accept_presence(&peer_id, presence);
        }

        let mut presences = Vec::new();
        let mut blocks = Vec::new();

        for (request, reply) in requests.iter().zip(replies) {
            match reply {
                Some(Reply::Block(block)) if !fits_frame(&trace_id, &block) => {
                    warn!(
                        %peer_id,
                        cid = %request.want.cid,
                        size = block.data.len(),
                        max = MAX_FRAME_SIZE,
                        "block does not fit in a frame, not serving it"
                    );

                    if request.send_dont_have {
                        presences.push(BlockPresence::dont_have(&request.want));
                    }
                }
                Some(Reply::Block(block)) => blocks.push(block),
                Some(Reply::Presence(presence)) => presences.push(presence),
                None => {}
            }
        }

        if presences.is_empty() && blocks.is_empty() {
            return Ok(());
        }

        debug!(
            %peer_id,
            presences = presences.len(),
            blocks = blocks.len(),
            "replying to wantlist"
        );

        let _ = build_and_send(
            connection,
            self.max_message_size,
            &trace_id,
            Vec::new(),
            presences,
            blocks,
        )
        .await?;

        Ok(())
    }

    async fn serve(&self, requester: &Cid, request: &Request) -> Option<Reply> {
        let Request {
            want,
            want_type,
            send_dont_have,
        } = request;

        let present = self.contains(&want.cid).await;

        if *want_type == WantType::Block && present && self.authorise(requester, want).await {
            if let Some(data) = self.fetch(&want.cid).await {
                return Some(Reply::Block(Block::from_parts(
                    &want.cid,
                    data,
                    want.auth.as_ref(),
                )));
            }
        }

        if *want_type == WantType::Have && present {
            return Some(Reply::Presence(BlockPresence::have(want)));
        }

        send_dont_have.then(|| Reply::Presence(BlockPresence::dont_have(want)))
    }

    fn accept_block(&self, peer_id: &PeerId, block: &Block) {
        let block = match block.to_hashed() {
            Ok(block) => block,
            Err(err) => {
                self.metrics.record_block_rejected();
                warn!(%peer_id, %err, "discarding block");
                return;
            }
        };

        if self.wants.resolve(&block) {
            self.metrics.record_block_received();
            debug!(%peer_id, cid = %block.cid(), "received wanted block");
        } else {
            self.metrics.record_unwanted_block();
            debug!(%peer_id, cid = %block.cid(), "received block nobody wants");
        }
    }

    fn accept_presence(&self, peer_id: &PeerId, presence: &BlockPresence) {
        if presence.r#type() != BlockPresenceType::Have {
            return;
        }

        match presence.to_want() {
            Ok(want) if self.wants.is_pending(&want) => self.haves.record(want, *peer_id),
            Ok(_) => {}
            Err(err) => debug!(%peer_id, %err, "ignoring malformed presence"),
        }
    }

    async fn contains(&self, cid: &Cid) -> bool {
        self.store.has(cid).await.unwrap_or_else(|err| {
            warn!(%cid, ?err, "block store lookup failed");
            false
        })
    }

    async fn fetch(&self, cid: &Cid) -> Option<Bytes> {
        self.store.get(cid).await.unwrap_or_else(|err| {
            warn!(%cid, ?err, "block store read failed");
            None
        })
    }

    async fn authorise(&self, requester: &Cid, want: &Want) -> bool {
        self.authoriser
            .allow_read(&want.cid, requester, want.auth.as_ref())
            .await
            .unwrap_or_else(|err| {
                warn!(cid = %want.cid, %requester, ?err, "authoriser failed");
                false
            })
    }

    fn targets(&self, peers: &[PeerId]) -> Vec<PeerId> {
        if peers.is_empty() {
            self.peers.connected()
        } else {
            peers.to_vec()
        }
    }

    async fn send_entries(&self, targets: &[PeerId], entries: &[Entry]) -> usize {
        if entries.is_empty() {
            return 0;
        }

        let mut sent = 0;

        for peer_id in targets {
            let Some(mut outbox) = self.peers.outbox(peer_id) else {
                debug!(%peer_id, "not connected, skipping wantlist");
                continue;
            };

            let trace_id = if self.tracer.is_enabled() {
                TraceLog::new_trace_id()
            } else {
                String::new()
            };

            match build_and_send(
                &mut outbox,
                self.max_message_size,
                &trace_id,
                entries.to_vec(),
                Vec::new(),
                Vec::new(),
            )
            .await
            {
                Ok(_) => sent += 1,
                Err(err) => warn!(%peer_id, ?err, "failed to queue wantlist"),
            }
        }

        sent
    }
}

/// Whether `block` can travel in a frame of its own.
fn fits_frame(trace_id: &str, block: &Block) -> bool {
    Message::base_len(trace_id) + block.field_len() <= MAX_FRAME_SIZE
}

/// Decodes a wantlist into the wants to serve, in order.
///
/// Cancel entries produce no reply, and a want cancelled by a later entry of
/// the same wantlist is dropped.
fn requests(peer_id: &PeerId, entries: Vec<Entry>) -> Vec<Request> {
    let mut cancelled = HashSet::new();
    let mut requests = Vec::new();

    for entry in entries.into_iter().rev() {
        let want = match entry.to_want() {
            Ok(want) => want,
            Err(err) => {
                debug!(%peer_id, %err, "ignoring malformed wantlist entry");
                continue;
            }
        };

        if entry.cancel {
            let _ = cancelled.insert(want);
            continue;
        }

        if cancelled.contains(&want) {
            continue;
        }

        requests.push(Request {
            want_type: entry.want_type(),
            send_dont_have: entry.send_dont_have,
            want,
        });
    }

    requests.reverse();
    requests
}

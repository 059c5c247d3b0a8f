//! Greedy packing of reply records into size-bounded frames.
//!
//! Records keep their relative order within each kind and kinds are emitted
//! as wantlist entries, then presences, then blocks. Sizes are the exact
//! number of bytes a record adds to the encoded frame, so a frame is closed
//! as soon as the next record would push it over the limit. A record that is
//! larger than the limit on its own still goes out, alone in its frame.

#[cfg(test)]
#[path = "tests/batcher.rs"]
mod tests;

use async_trait::async_trait;
use eyre::{eyre, Result as EyreResult};
use tokio::sync::mpsc;
use tracing::warn;
use trove_network_primitives::messages::{Block, BlockPresence, Entry, Message, Wantlist};

/// Anything frames can be handed to.
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: Message) -> EyreResult<()>;
}

#[async_trait]
impl MessageSink for mpsc::Sender<Message> {
    async fn send(&mut self, message: Message) -> EyreResult<()> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| eyre!("peer outbox closed"))
    }
}

#[async_trait]
impl MessageSink for Vec<Message> {
    async fn send(&mut self, message: Message) -> EyreResult<()> {
        self.push(message);

        Ok(())
    }
}

#[derive(Debug)]
pub struct MessageBatcher {
    max_message_size: usize,
    trace_id: String,
    frame: Message,
    frame_len: usize,
    entries_len: usize,
    frames: Vec<Message>,
}

impl MessageBatcher {
    #[must_use]
    pub fn new(max_message_size: usize, trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();

        Self {
            max_message_size,
            frame: Message::traced(trace_id.clone()),
            frame_len: Message::base_len(&trace_id),
            entries_len: 0,
            frames: Vec::new(),
            trace_id,
        }
    }

    pub fn push_entry(&mut self, entry: Entry) {
        let entry_len = entry.field_len();

        self.make_room(self.entry_cost(entry_len));

        let cost = self.entry_cost(entry_len);
        self.frame_len += cost;
        self.entries_len += entry_len;
        self.frame
            .wantlist
            .get_or_insert_with(Wantlist::default)
            .entries
            .push(entry);
    }

    pub fn push_presence(&mut self, presence: BlockPresence) {
        let cost = presence.field_len();

        self.make_room(cost);

        self.frame_len += cost;
        self.frame.block_presences.push(presence);
    }

    pub fn push_block(&mut self, block: Block) {
        let cost = block.field_len();

        self.make_room(cost);

        self.frame_len += cost;
        self.frame.payload.push(block);
    }

    /// Closes the last frame and returns every frame built, in order.
    #[must_use]
    pub fn finish(mut self) -> Vec<Message> {
        if !self.frame.is_empty() {
            self.frames.push(self.frame);
        }

        self.frames
    }

    /// Bytes a new entry adds, including the growth of the wantlist wrapper.
    fn entry_cost(&self, entry_len: usize) -> usize {
        let wrapper = if self.entries_len == 0 {
            0
        } else {
            Message::wantlist_len(self.entries_len)
        };

        Message::wantlist_len(self.entries_len + entry_len) - wrapper
    }

    fn make_room(&mut self, cost: usize) {
        if self.frame.is_empty() {
            if self.frame_len + cost > self.max_message_size {
                warn!(
                    size = self.frame_len + cost,
                    max = self.max_message_size,
                    "record exceeds the message size limit, sending it alone"
                );
            }
            return;
        }

        if self.frame_len + cost > self.max_message_size {
            let next = Message::traced(self.trace_id.clone());
            self.frames.push(core::mem::replace(&mut self.frame, next));
            self.frame_len = Message::base_len(&self.trace_id);
            self.entries_len = 0;
        }
    }
}

/// Packs the three record lists into frames no larger than
/// `max_message_size`, each stamped with `trace_id`.
#[must_use]
pub fn pack(
    max_message_size: usize,
    trace_id: &str,
    entries: Vec<Entry>,
    presences: Vec<BlockPresence>,
    blocks: Vec<Block>,
) -> Vec<Message> {
    let mut batcher = MessageBatcher::new(max_message_size, trace_id);

    for entry in entries {
        batcher.push_entry(entry);
    }

    for presence in presences {
        batcher.push_presence(presence);
    }

    for block in blocks {
        batcher.push_block(block);
    }

    batcher.finish()
}

/// Packs the records and hands each frame to `sink`. Returns the number of
/// frames sent; nothing is sent when all lists are empty.
pub async fn build_and_send<S: MessageSink + ?Sized>(
    sink: &mut S,
    max_message_size: usize,
    trace_id: &str,
    entries: Vec<Entry>,
    presences: Vec<BlockPresence>,
    blocks: Vec<Block>,
) -> EyreResult<usize> {
    let frames = pack(max_message_size, trace_id, entries, presences, blocks);
    let count = frames.len();

    for frame in frames {
        sink.send(frame).await?;
    }

    Ok(count)
}

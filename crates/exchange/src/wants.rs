//! Locally outstanding wants.
//!
//! Each want is backed by a one-shot channel whose receiver is shared, so
//! every caller asking for the same want awaits the same future, and the
//! first verified block to arrive completes it exactly once.

#[cfg(test)]
#[path = "tests/wants.rs"]
mod tests;

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use dashmap::DashMap;
use futures_util::future::Shared;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;
use trove_primitives::block::HashedBlock;
use trove_primitives::cid::Cid;
use trove_primitives::want::{AuthToken, Want};

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WantError {
    #[error("want for {0} was dropped before a block arrived")]
    Abandoned(Cid),
}

/// Resolves with the block once any peer delivers it.
#[derive(Clone)]
#[must_use = "futures do nothing unless polled"]
pub struct WantFuture {
    cid: Cid,
    inner: Shared<oneshot::Receiver<HashedBlock>>,
}

impl WantFuture {
    #[must_use]
    pub const fn cid(&self) -> &Cid {
        &self.cid
    }

    /// Whether both handles wait on the same pending want.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl Future for WantFuture {
    type Output = Result<HashedBlock, WantError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let cid = self.cid;

        self.inner
            .poll_unpin(cx)
            .map(|result| result.map_err(|_| WantError::Abandoned(cid)))
    }
}

impl fmt::Debug for WantFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WantFuture")
            .field("cid", &self.cid.to_string())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct PendingWant {
    sender: oneshot::Sender<HashedBlock>,
    future: WantFuture,
    created: Instant,
}

#[derive(Debug)]
pub struct WantTable {
    wants: DashMap<Cid, HashMap<Option<AuthToken>, PendingWant>>,
    recency: Duration,
}

impl WantTable {
    #[must_use]
    pub fn new(recency: Duration) -> Self {
        Self {
            wants: DashMap::new(),
            recency,
        }
    }

    /// Returns the pending future for `want`, creating it if none exists.
    pub fn register(&self, want: Want) -> WantFuture {
        let Want { cid, auth } = want;
        let mut by_auth = self.wants.entry(cid).or_default();

        match by_auth.entry(auth) {
            Entry::Occupied(pending) => pending.get().future.clone(),
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                let future = WantFuture {
                    cid,
                    inner: receiver.shared(),
                };

                debug!(%cid, "registered want");

                let _ = slot.insert(PendingWant {
                    sender,
                    future: future.clone(),
                    created: Instant::now(),
                });

                future
            }
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.wants.is_empty()
    }

    #[must_use]
    pub fn is_pending(&self, want: &Want) -> bool {
        self.wants
            .get(&want.cid)
            .is_some_and(|by_auth| by_auth.contains_key(&want.auth))
    }

    /// Number of distinct pending wants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wants.iter().map(|by_auth| by_auth.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wants.is_empty()
    }

    /// Pending wants worth advertising to `peers`.
    ///
    /// A single peer only hears about wants registered within the recency
    /// window; broadcasts carry everything still pending.
    #[must_use]
    pub fn list(&self, peers: usize) -> Vec<Want> {
        let now = Instant::now();
        let recent = |pending: &PendingWant| {
            peers != 1 || now.saturating_duration_since(pending.created) < self.recency
        };

        let mut wants = Vec::new();

        for by_auth in &self.wants {
            for (auth, pending) in by_auth.value() {
                if recent(pending) {
                    wants.push(Want::with_auth(*by_auth.key(), auth.clone()));
                }
            }
        }

        wants
    }

    /// Completes every want for the block's CID, whatever its auth token, and
    /// forgets them. Returns whether anyone was waiting.
    pub fn resolve(&self, block: &HashedBlock) -> bool {
        let Some((cid, by_auth)) = self.wants.remove(block.cid()) else {
            return false;
        };

        for (_, pending) in by_auth {
            if pending.sender.send(block.clone()).is_err() {
                debug!(%cid, "want completed after every waiter went away");
            }
        }

        true
    }
}

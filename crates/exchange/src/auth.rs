#[cfg(test)]
#[path = "tests/auth.rs"]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result as EyreResult;
use trove_primitives::cid::Cid;
use trove_primitives::want::AuthToken;

/// Decides whether `requester` may read `cid`.
///
/// `requester` is the peer id expressed as a `libp2p-key` CID. A denied read
/// is answered exactly like a missing block.
#[async_trait]
pub trait Authoriser: Send + Sync {
    async fn allow_read(
        &self,
        cid: &Cid,
        requester: &Cid,
        auth: Option<&AuthToken>,
    ) -> EyreResult<bool>;
}

#[async_trait]
impl<T: Authoriser + ?Sized> Authoriser for Arc<T> {
    async fn allow_read(
        &self,
        cid: &Cid,
        requester: &Cid,
        auth: Option<&AuthToken>,
    ) -> EyreResult<bool> {
        (**self).allow_read(cid, requester, auth).await
    }
}

/// Serves every block to everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl Authoriser for AllowAll {
    async fn allow_read(&self, _: &Cid, _: &Cid, _: Option<&AuthToken>) -> EyreResult<bool> {
        Ok(true)
    }
}

/// Refuses any read that does not carry an auth token.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequireAuth;

#[async_trait]
impl Authoriser for RequireAuth {
    async fn allow_read(&self, _: &Cid, _: &Cid, auth: Option<&AuthToken>) -> EyreResult<bool> {
        Ok(auth.is_some())
    }
}

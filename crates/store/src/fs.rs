#[cfg(test)]
#[path = "tests/fs.rs"]
mod tests;

use std::io::ErrorKind;

use async_trait::async_trait;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use eyre::{bail, Result as EyreResult, WrapErr};
use tokio::fs;
use tracing::debug;
use trove_primitives::block::HashedBlock;
use trove_primitives::cid::{self, Cid};

use crate::BlockStore;

/// One file per block, named by its CID, under a single root directory.
#[derive(Clone, Debug)]
pub struct FileSystemBlockStore {
    root: Utf8PathBuf,
}

impl FileSystemBlockStore {
    pub async fn new(root: &Utf8Path) -> EyreResult<Self> {
        fs::create_dir_all(root)
            .await
            .wrap_err_with(|| format!("failed to create block store at {root}"))?;

        Ok(Self {
            root: root.to_owned(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn path(&self, cid: &Cid) -> Utf8PathBuf {
        self.root.join(cid.to_string())
    }

    /// Writes under a unique temporary name and renames into place, so
    /// concurrent writers of the same block never see a torn file.
    async fn write(&self, cid: &Cid, data: &[u8]) -> EyreResult<()> {
        let path = self.path(cid);

        if fs::try_exists(&path).await? {
            return Ok(());
        }

        let partial = self
            .root
            .join(format!("{cid}.{:016x}.partial", rand::random::<u64>()));

        fs::write(&partial, data)
            .await
            .wrap_err_with(|| format!("failed to write block {cid}"))?;

        if let Err(err) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;

            if !fs::try_exists(&path).await? {
                return Err(err).wrap_err_with(|| format!("failed to store block {cid}"));
            }
        }

        debug!(%cid, size = data.len(), "stored block");

        Ok(())
    }
}

#[async_trait]
impl BlockStore for FileSystemBlockStore {
    async fn has(&self, cid: &Cid) -> EyreResult<bool> {
        fs::try_exists(self.path(cid)).await.map_err(Into::into)
    }

    async fn get(&self, cid: &Cid) -> EyreResult<Option<Bytes>> {
        let data = match fs::read(self.path(cid)).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if !cid::matches(cid, &data) {
            bail!("stored block {cid} does not match its digest");
        }

        Ok(Some(data.into()))
    }

    async fn put(&self, data: Bytes, codec: u64) -> EyreResult<Cid> {
        let cid = cid::cid_of(codec, &data);

        self.write(&cid, &data).await?;

        Ok(cid)
    }

    async fn put_block(&self, block: &HashedBlock) -> EyreResult<()> {
        self.write(block.cid(), block.data()).await
    }
}

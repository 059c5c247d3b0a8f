#[cfg(test)]
#[path = "tests/cid.rs"]
mod tests;

use ::cid::Version;
use libp2p_identity::PeerId;
use multihash::Multihash;
use prost::encoding::{decode_varint, encode_varint, encoded_len_varint};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use ::cid::Cid;

/// Multicodec for raw binary blocks.
pub const RAW: u64 = 0x55;
/// Multicodec for dag-pb nodes (the only codec CIDv0 can carry).
pub const DAG_PB: u64 = 0x70;
/// Multicodec for dag-cbor nodes.
pub const DAG_CBOR: u64 = 0x71;
/// Multicodec for a libp2p public key, used to express peer ids as CIDs.
pub const LIBP2P_KEY: u64 = 0x72;

/// Multihash code of sha2-256, the only hash function blocks are verified with.
pub const SHA2_256: u64 = 0x12;
pub const SHA2_256_LEN: u64 = 32;

#[derive(Debug, Error)]
pub enum CidError {
    #[error("malformed cid prefix: {0}")]
    Varint(#[from] prost::DecodeError),

    #[error("unsupported hash function 0x{0:x}")]
    UnsupportedHash(u64),

    #[error("digest length {actual} does not match the advertised {expected}")]
    DigestLength { expected: u64, actual: u64 },

    #[error("trailing bytes after cid prefix")]
    TrailingBytes,

    #[error(transparent)]
    Cid(#[from] ::cid::Error),

    #[error(transparent)]
    Multihash(#[from] multihash::Error),
}

/// The leading fields of a CID, sent in place of the CID alongside block data.
///
/// The digest is left out: the receiver recomputes it from the bytes it got,
/// so a block can only ever name the content it actually carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Prefix {
    pub version: Version,
    pub codec: u64,
    pub hash_code: u64,
    pub hash_len: u64,
}

impl Prefix {
    #[must_use]
    pub fn of(cid: &Cid) -> Self {
        let hash = cid.hash();

        Self {
            version: cid.version(),
            codec: cid.codec(),
            hash_code: hash.code(),
            hash_len: u64::from(hash.size()),
        }
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        encoded_len_varint(u64::from(self.version))
            + encoded_len_varint(self.codec)
            + encoded_len_varint(self.hash_code)
            + encoded_len_varint(self.hash_len)
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());

        encode_varint(u64::from(self.version), &mut buf);
        encode_varint(self.codec, &mut buf);
        encode_varint(self.hash_code, &mut buf);
        encode_varint(self.hash_len, &mut buf);

        buf
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, CidError> {
        let version = Version::try_from(decode_varint(&mut bytes)?)?;
        let codec = decode_varint(&mut bytes)?;
        let hash_code = decode_varint(&mut bytes)?;
        let hash_len = decode_varint(&mut bytes)?;

        if !bytes.is_empty() {
            return Err(CidError::TrailingBytes);
        }

        Ok(Self {
            version,
            codec,
            hash_code,
            hash_len,
        })
    }

    /// Hashes `data` with the prefix's hash function and returns the CID the
    /// data actually has under this prefix.
    pub fn to_cid(&self, data: &[u8]) -> Result<Cid, CidError> {
        if self.hash_code != SHA2_256 {
            return Err(CidError::UnsupportedHash(self.hash_code));
        }

        if self.hash_len != SHA2_256_LEN {
            return Err(CidError::DigestLength {
                expected: self.hash_len,
                actual: SHA2_256_LEN,
            });
        }

        Ok(Cid::new(self.version, self.codec, sha256(data))?)
    }
}

#[must_use]
pub fn sha256(data: &[u8]) -> Multihash<64> {
    Multihash::wrap(SHA2_256, &Sha256::digest(data))
        .expect("a sha2-256 digest always fits in a 64 byte multihash")
}

/// CIDv1 of `data` under `codec`, hashed with sha2-256.
#[must_use]
pub fn cid_of(codec: u64, data: &[u8]) -> Cid {
    Cid::new_v1(codec, sha256(data))
}

#[must_use]
pub fn raw_cid(data: &[u8]) -> Cid {
    cid_of(RAW, data)
}

/// Whether `data` hashes to the digest carried by `cid`.
///
/// Returns `false` for hash functions other than sha2-256.
#[must_use]
pub fn matches(cid: &Cid, data: &[u8]) -> bool {
    let hash = cid.hash();

    hash.code() == SHA2_256 && hash.digest() == Sha256::digest(data).as_slice()
}

/// A peer's identity expressed as a `libp2p-key` CID, the form authorisers
/// and trace output refer to requesters by.
pub fn peer_cid(peer_id: &PeerId) -> Result<Cid, CidError> {
    let hash = Multihash::<64>::from_bytes(&peer_id.to_bytes())?;

    Ok(Cid::new_v1(LIBP2P_KEY, hash))
}

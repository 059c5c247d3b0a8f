//! Value types shared by every trove crate: content identifiers and their
//! wire prefixes, wants, and hash-verified blocks.

pub mod block;
pub mod cid;
pub mod want;

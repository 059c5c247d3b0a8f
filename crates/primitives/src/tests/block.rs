use super::*;
use crate::cid::{raw_cid, DAG_CBOR};

#[test]
fn test_new_verifies_digest() {
    let cid = raw_cid(b"hello");

    let block = HashedBlock::new(cid, &b"hello"[..]).unwrap();
    assert_eq!(block.cid(), &cid);
    assert_eq!(block.data().as_ref(), b"hello");

    let err = HashedBlock::new(cid, &b"goodbye"[..]).unwrap_err();
    assert!(matches!(err, BlockError::HashMismatch { cid: c } if c == cid));
}

#[test]
fn test_from_prefix_names_the_carried_bytes() {
    let cid = crate::cid::cid_of(DAG_CBOR, b"node");
    let prefix = Prefix::of(&cid);

    let block = HashedBlock::from_prefix(&prefix, &b"node"[..]).unwrap();
    assert_eq!(block.cid(), &cid);

    let other = HashedBlock::from_prefix(&prefix, &b"tampered"[..]).unwrap();
    assert_ne!(other.cid(), &cid);
}

#[test]
fn test_raw_block() {
    let block = HashedBlock::raw(&b"hello"[..]);
    let (cid, data) = block.clone().into_parts();

    assert_eq!(cid, raw_cid(b"hello"));
    assert_eq!(data.as_ref(), b"hello");
    assert_eq!(HashedBlock::new(cid, data).unwrap(), block);
}

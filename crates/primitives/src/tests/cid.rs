use libp2p_identity::Keypair;

use super::*;

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

#[test]
fn test_raw_cid_digest() {
    let cid = raw_cid(b"hello");

    assert_eq!(cid.version(), Version::V1);
    assert_eq!(cid.codec(), RAW);
    assert_eq!(cid.hash().code(), SHA2_256);
    assert_eq!(hex::encode(cid.hash().digest()), HELLO_SHA256);
}

#[test]
fn test_prefix_bytes() {
    let prefix = Prefix::of(&raw_cid(b"hello"));

    assert_eq!(prefix.to_bytes(), vec![0x01, 0x55, 0x12, 0x20]);
    assert_eq!(prefix.encoded_len(), 4);
    assert_eq!(Prefix::from_bytes(&prefix.to_bytes()).unwrap(), prefix);
}

#[test]
fn test_prefix_rebuilds_cid_from_data() {
    let cid = cid_of(DAG_CBOR, b"some node");
    let prefix = Prefix::of(&cid);

    assert_eq!(prefix.to_cid(b"some node").unwrap(), cid);
    assert_ne!(prefix.to_cid(b"another node").unwrap(), cid);
}

#[test]
fn test_prefix_rejects_unsupported_hash() {
    // blake2b-256
    let prefix = Prefix {
        version: Version::V1,
        codec: RAW,
        hash_code: 0xb220,
        hash_len: 32,
    };

    let err = Prefix::from_bytes(&prefix.to_bytes())
        .unwrap()
        .to_cid(b"hello")
        .unwrap_err();

    assert!(matches!(err, CidError::UnsupportedHash(0xb220)));
}

#[test]
fn test_prefix_rejects_truncated_digest_length() {
    let prefix = Prefix {
        version: Version::V1,
        codec: RAW,
        hash_code: SHA2_256,
        hash_len: 20,
    };

    assert!(matches!(
        prefix.to_cid(b"hello"),
        Err(CidError::DigestLength { expected: 20, .. })
    ));
}

#[test]
fn test_prefix_rejects_malformed_bytes() {
    assert!(Prefix::from_bytes(&[]).is_err());
    assert!(Prefix::from_bytes(&[0x01, 0x55, 0x12]).is_err());
    assert!(matches!(
        Prefix::from_bytes(&[0x01, 0x55, 0x12, 0x20, 0x00]),
        Err(CidError::TrailingBytes)
    ));
    // version 7 does not exist
    assert!(Prefix::from_bytes(&[0x07, 0x55, 0x12, 0x20]).is_err());
}

#[test]
fn test_matches() {
    let cid = raw_cid(b"hello");

    assert!(matches(&cid, b"hello"));
    assert!(!matches(&cid, b"hello!"));
}

#[test]
fn test_peer_cid() {
    let peer_id = Keypair::generate_ed25519().public().to_peer_id();
    let cid = peer_cid(&peer_id).unwrap();

    assert_eq!(cid.codec(), LIBP2P_KEY);
    assert_eq!(cid.hash().to_bytes(), peer_id.to_bytes());
}

use prost::Message as _;
use trove_primitives::cid::raw_cid;

use super::*;

fn want(data: &[u8]) -> Want {
    Want::new(raw_cid(data))
}

#[test]
fn test_entry_carries_want() {
    let token = AuthToken::new(vec![1, 2, 3]);
    let wanted = Want::with_auth(raw_cid(b"hello"), Some(token));

    let entry = Entry::want(&wanted, WantType::Have, true);

    assert_eq!(entry.want_type(), WantType::Have);
    assert!(entry.send_dont_have);
    assert!(!entry.cancel);
    assert_eq!(entry.to_want().unwrap(), wanted);
}

#[test]
fn test_cancel_entry() {
    let entry = Entry::cancel(&want(b"hello"));

    assert!(entry.cancel);
    assert_eq!(entry.to_want().unwrap(), want(b"hello"));
}

#[test]
fn test_entry_rejects_garbage_cid() {
    let entry = Entry {
        block: vec![0xff, 0xff],
        ..Entry::default()
    };

    assert!(entry.to_want().is_err());
}

#[test]
fn test_block_verifies_payload() {
    let block = HashedBlock::raw(&b"hello"[..]);
    let wire = Block::new(&block, None);

    assert_eq!(wire.prefix, [0x01, 0x55, 0x12, 0x20]);
    assert_eq!(wire.auth(), None);
    assert_eq!(wire.to_hashed().unwrap(), block);
}

#[test]
fn test_block_with_tampered_prefix() {
    let block = HashedBlock::raw(&b"hello"[..]);
    let mut wire = Block::new(&block, None);
    wire.prefix = vec![0x01, 0x55, 0xa0, 0xe4, 0x02, 0x20];

    assert!(wire.to_hashed().is_err());
}

#[test]
fn test_presences() {
    let wanted = want(b"hello");

    let have = BlockPresence::have(&wanted);
    let dont_have = BlockPresence::dont_have(&wanted);

    assert_eq!(have.r#type(), BlockPresenceType::Have);
    assert_eq!(dont_have.r#type(), BlockPresenceType::DontHave);
    assert_eq!(dont_have.to_want().unwrap(), wanted);
}

#[test]
fn test_field_lengths_sum_to_frame_length() {
    let entries = vec![
        Entry::want(&want(b"a"), WantType::Block, true),
        Entry::cancel(&want(b"b")),
    ];
    let payload = vec![Block::new(&HashedBlock::raw(&b"c"[..]), None)];
    let block_presences = vec![BlockPresence::dont_have(&want(b"d"))];

    let entries_len: usize = entries.iter().map(Entry::field_len).sum();
    let expected = Message::base_len("0123456789abcdef0123456789abcdef")
        + Message::wantlist_len(entries_len)
        + payload.iter().map(Block::field_len).sum::<usize>()
        + block_presences.iter().map(BlockPresence::field_len).sum::<usize>();

    let message = Message {
        wantlist: Some(Wantlist {
            entries,
            full: false,
        }),
        payload,
        block_presences,
        trace_id: "0123456789abcdef0123456789abcdef".to_owned(),
        ..Message::default()
    };

    assert_eq!(message.encoded_len(), expected);
}

#[test]
fn test_empty_message() {
    let message = Message::traced("abc");

    assert!(message.is_empty());
    assert!(message.entries().is_empty());
    assert_eq!(message.encoded_len(), Message::base_len("abc"));
    assert_eq!(Message::base_len(""), 0);
}

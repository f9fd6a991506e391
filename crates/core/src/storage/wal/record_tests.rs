// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn header_of(record: &WalRecord) -> RecordHeader {
    let encoded = record.encode();
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&encoded[..HEADER_SIZE]);
    RecordHeader::decode(&raw)
}

#[test]
fn encoded_record_has_fixed_header_plus_payload() {
    let record = WalRecord::new(
        1,
        EntryType::Data,
        MessageId::new(),
        Bytes::from_static(b"hello"),
    );

    let encoded = record.encode();

    assert_eq!(encoded.len(), HEADER_SIZE + 5);
    assert_eq!(record.encoded_len(), encoded.len());
    assert_eq!(&encoded[HEADER_SIZE..], b"hello");
}

#[test]
fn header_fields_are_big_endian_at_fixed_offsets() {
    let id = MessageId::from_halves(0x0102_0304_0506_0708, 0x1112_1314_1516_1718);
    let record = WalRecord::new(7, EntryType::Ack, id, Bytes::new());

    let encoded = record.encode();

    assert_eq!(&encoded[0..4], &[0x51, 0x57, 0x41, 0x4C]);
    assert_eq!(&encoded[4..12], &7u64.to_be_bytes());
    assert_eq!(&encoded[12..16], &3u32.to_be_bytes());
    assert_eq!(&encoded[16..24], &0x0102_0304_0506_0708u64.to_be_bytes());
    assert_eq!(&encoded[24..32], &0x1112_1314_1516_1718u64.to_be_bytes());
    assert_eq!(&encoded[32..36], &0i32.to_be_bytes());
}

#[test]
fn header_decodes_what_encode_wrote() {
    let id = MessageId::new();
    let record = WalRecord::new(42, EntryType::Config, id, Bytes::from_static(b"abc"));

    let header = header_of(&record);

    assert_eq!(header.magic, MAGIC);
    assert_eq!(header.lsn, 42);
    assert_eq!(header.entry_type, EntryType::Config.tag());
    assert_eq!(header.correlation_id, id);
    assert_eq!(header.payload_len, 3);
    assert_eq!(header.checksum, checksum(b"abc"));
}

#[test]
fn checksum_covers_payload_only() {
    let payload = Bytes::from_static(b"same payload");
    let a = WalRecord::new(1, EntryType::Data, MessageId::new(), payload.clone());
    let b = WalRecord::new(9, EntryType::Ack, MessageId::new(), payload);

    assert_eq!(header_of(&a).checksum, header_of(&b).checksum);
}

#[parameterized(
    config = { 1, Some(EntryType::Config) },
    data = { 2, Some(EntryType::Data) },
    ack = { 3, Some(EntryType::Ack) },
    zero = { 0, None },
    unknown = { 99, None },
)]
fn entry_type_from_tag(tag: u32, expected: Option<EntryType>) {
    assert_eq!(EntryType::try_from(tag).ok(), expected);
}

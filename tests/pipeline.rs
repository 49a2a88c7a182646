//! Cross-module scenarios exercised from raw datagram bytes down through
//! dispatch, rather than unit-testing one module at a time. Byte arrays are
//! hand-built rather than golden captures; see each test for its layout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;

use photon_scout::protocol::command::{parse_envelope, Command, CommandKind};
use photon_scout::protocol::error::DecodeError;
use photon_scout::registry::RecordDescriptor;
use photon_scout::PhotonPipeline;

fn envelope_header(command_count: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&1u16.to_be_bytes()); // peer id
    buf.push(0); // crc
    buf.push(command_count);
    buf.extend_from_slice(&0u32.to_be_bytes()); // timestamp
    buf.extend_from_slice(&0i32.to_be_bytes()); // challenge
    buf
}

fn command_header(kind: u8, seq: u32, body_len: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(kind);
    buf.push(0); // channel id
    buf.push(0); // flags
    buf.push(0); // reserved
    buf.extend_from_slice(&(12 + body_len).to_be_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf
}

#[derive(Debug, Default)]
struct PingRecord {
    amount: i32,
}

#[test_log::test]
fn simple_operation_request_binds_the_declared_field() -> anyhow::Result<()> {
    let payload = vec![
        0xF3, 0x02, 0x06, // signature, OperationRequest, opcode 6
        0x00, 0x01, // param count = 1
        0xF5, 0x6B, 0x00, 0x7B, // param id 245, tag 107 (Int16), value 123
    ];

    let mut datagram = envelope_header(1);
    datagram.extend_from_slice(&command_header(6, 0, payload.len() as u32)); // SendReliable
    datagram.extend_from_slice(&payload);

    let envelope = parse_envelope(&datagram)?;
    assert_eq!(envelope.commands.len(), 1);

    let mut pipeline = PhotonPipeline::new();
    pipeline.registry().register_operation(
        6,
        RecordDescriptor::<PingRecord>::new().integer("amount", [245], |r, v| r.amount = v),
    );

    let seen = Arc::new(AtomicBool::new(false));
    let seen_clone = Arc::clone(&seen);
    pipeline.registry().register_listener(move |record| {
        if let Some(r) = record.downcast_ref::<PingRecord>() {
            assert_eq!(r.amount, 123);
            seen_clone.store(true, Ordering::SeqCst);
        }
    });

    for command in envelope.commands {
        pipeline.handle_command(command);
    }

    assert!(seen.load(Ordering::SeqCst));
    Ok(())
}

#[derive(Debug, Default)]
struct MoveEvent {
    event_code: i64,
}

#[test_log::test]
fn move_event_with_no_discriminator_is_synthesized_before_dispatch() {
    let payload = vec![
        0xF3, 0x04, 0x03, // signature, EventData, event code 3 (Move)
        0x00, 0x00, // param count = 0
    ];

    let mut datagram = envelope_header(1);
    datagram.extend_from_slice(&command_header(6, 0, payload.len() as u32));
    datagram.extend_from_slice(&payload);

    let envelope = parse_envelope(&datagram).unwrap();

    let mut pipeline = PhotonPipeline::new();
    pipeline.registry().register_event(
        3,
        RecordDescriptor::<MoveEvent>::new().integer("event_code", [252], |r, v| {
            r.event_code = v as i64
        }),
    );

    let seen = Arc::new(AtomicBool::new(false));
    let seen_clone = Arc::clone(&seen);
    pipeline.registry().register_listener(move |record| {
        if let Some(r) = record.downcast_ref::<MoveEvent>() {
            assert_eq!(r.event_code, 3);
            seen_clone.store(true, Ordering::SeqCst);
        }
    });

    for command in envelope.commands {
        pipeline.handle_command(command);
    }

    assert!(seen.load(Ordering::SeqCst));
}

#[test_log::test]
fn fragment_reassembly_emits_a_single_command() {
    let full = b"HELLOWORLD";
    let first = &full[..5]; // "HELLO"
    let second = &full[5..]; // "WORLD"

    let mut fragment_zero = Vec::new();
    fragment_zero.extend_from_slice(&42u32.to_be_bytes()); // seq
    fragment_zero.extend_from_slice(&2i32.to_be_bytes()); // fragment count
    fragment_zero.extend_from_slice(&0i32.to_be_bytes()); // fragment number
    fragment_zero.extend_from_slice(&10i32.to_be_bytes()); // total length
    fragment_zero.extend_from_slice(&0i32.to_be_bytes()); // offset
    fragment_zero.extend_from_slice(first);

    let mut fragment_one = Vec::new();
    fragment_one.extend_from_slice(&42u32.to_be_bytes());
    fragment_one.extend_from_slice(&2i32.to_be_bytes());
    fragment_one.extend_from_slice(&1i32.to_be_bytes());
    fragment_one.extend_from_slice(&10i32.to_be_bytes());
    fragment_one.extend_from_slice(&5i32.to_be_bytes());
    fragment_one.extend_from_slice(second);

    // Arrival order is reversed (fragment 1 before fragment 0); the buffer
    // must still assemble "HELLOWORLD" in fragment-number order.
    let command_one = Command {
        kind: CommandKind::SendReliableFragment,
        channel_id: 0,
        flags: 0,
        reserved: 0,
        reliable_sequence_number: 42,
        payload: fragment_one,
    };
    let command_zero = Command {
        kind: CommandKind::SendReliableFragment,
        channel_id: 0,
        flags: 0,
        reserved: 0,
        reliable_sequence_number: 42,
        payload: fragment_zero,
    };

    let mut buffer = photon_scout::protocol::fragment::FragmentBuffer::new();
    let fragment_one = photon_scout::protocol::fragment::parse_reliable_fragment(&command_one)
        .unwrap();
    let fragment_zero = photon_scout::protocol::fragment::parse_reliable_fragment(&command_zero)
        .unwrap();

    assert!(buffer.offer(fragment_one).is_none());
    let assembled = buffer.offer(fragment_zero).unwrap();

    assert_eq!(assembled.payload, full);
    assert_eq!(assembled.reliable_sequence_number, 42);
    assert_eq!(assembled.kind, CommandKind::SendReliable);
}

#[test_log::test]
fn lru_eviction_drops_the_oldest_incomplete_run_after_129_sequences() {
    use photon_scout::protocol::fragment::{FragmentBuffer, ReliableFragment};

    fn fragment(seq: u32, number: i32, byte: u8) -> ReliableFragment {
        ReliableFragment {
            sequence_number: seq,
            fragment_count: 2,
            fragment_number: number,
            total_length: 2,
            fragment_offset: number,
            data: vec![byte],
        }
    }

    let mut buffer = FragmentBuffer::new(); // default capacity 128

    for seq in 0..129u32 {
        assert!(buffer.offer(fragment(seq, 0, 0xAA)).is_none());
    }

    // Sequence 0 was the oldest and should have been evicted by now; its
    // completing fragment starts a fresh (incomplete) run instead of
    // assembling the one it began.
    assert!(buffer.offer(fragment(0, 1, 0xBB)).is_none());

    // Sequence 128, the most recently started run, is still live and
    // completes normally.
    let assembled = buffer.offer(fragment(128, 1, 0xCC)).unwrap();
    assert_eq!(assembled.reliable_sequence_number, 128);
}

#[test_log::test]
fn encrypted_message_is_silently_dropped() {
    let payload = vec![0xF3, 0x83]; // signature, type with high bit set

    let mut datagram = envelope_header(1);
    datagram.extend_from_slice(&command_header(6, 0, payload.len() as u32));
    datagram.extend_from_slice(&payload);

    let envelope = parse_envelope(&datagram).unwrap();

    let mut pipeline = PhotonPipeline::new();
    let seen = Arc::new(AtomicBool::new(false));
    let seen_clone = Arc::clone(&seen);
    pipeline.registry().register_listener(move |_| {
        seen_clone.store(true, Ordering::SeqCst);
    });

    for command in envelope.commands {
        pipeline.handle_command(command);
    }

    assert!(!seen.load(Ordering::SeqCst));
}

#[test_log::test]
fn malformed_datagram_declaring_too_many_commands_is_rejected_wholesale() {
    let payload = vec![0xF3, 0x02, 0x06, 0x00, 0x00];

    let mut datagram = envelope_header(2); // claims two commands
    datagram.extend_from_slice(&command_header(6, 0, payload.len() as u32)); // only one fits
    datagram.extend_from_slice(&payload);

    assert_matches!(parse_envelope(&datagram), Err(DecodeError::MalformedDatagram));
}

#[test_log::test]
fn character_id_wire_bytes_decode_to_the_expected_uuid() {
    let wire: [i8; 16] = [4, 3, 2, 1, 6, 5, 8, 7, 9, 10, 11, 12, 13, 14, 15, 16];
    let uuid = photon_scout::protocol::character_id::decode_character_id(&wire);
    assert_eq!(
        uuid.to_string(),
        "01020304-0506-0708-0910-111213141516"
    );
}

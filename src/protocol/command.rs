//! The UDP packet layer: splits a datagram into a Photon envelope header
//! and its command records, grounded on `protocol/photon/photon_layer.go`.

use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;

use super::cursor::ByteReader;
use super::error::DecodeError;

/// Size in bytes of a command header (everything before its payload).
pub const COMMAND_HEADER_LEN: u32 = 12;

/// The documented command type bytes. Decoded via `FromPrimitive` the same
/// way the teacher's `CommandTag` decodes a PulseAudio command word; any
/// byte with no variant here becomes [`CommandKind::Unknown`] rather than a
/// decode error, so a forward-compatible peer doesn't make the whole
/// datagram unparseable.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
enum CommandTag {
    Acknowledge = 1,
    Connect = 2,
    VerifyConnect = 3,
    Disconnect = 4,
    Ping = 5,
    SendReliable = 6,
    SendUnreliable = 7,
    SendReliableFragment = 8,
}

/// The kind of a Photon command. `Unknown` covers any value not in
/// the documented set, so a forward-compatible peer doesn't make the whole
/// datagram unparseable — the command is still split out, just not acted
/// on by the per-command classifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandKind {
    /// Acknowledges a previously sent reliable command.
    Acknowledge,
    /// Opens a connection.
    Connect,
    /// Confirms a connection.
    VerifyConnect,
    /// Closes a connection.
    Disconnect,
    /// A keep-alive.
    Ping,
    /// Carries a reliable message (or its un-fragmented reassembly).
    SendReliable,
    /// Carries an unreliable message.
    SendUnreliable,
    /// Carries one fragment of an oversized reliable message.
    SendReliableFragment,
    /// Any command type not in the documented set.
    Unknown(u8),
}

impl CommandKind {
    fn from_u8(v: u8) -> Self {
        match CommandTag::from_u8(v) {
            Some(CommandTag::Acknowledge) => CommandKind::Acknowledge,
            Some(CommandTag::Connect) => CommandKind::Connect,
            Some(CommandTag::VerifyConnect) => CommandKind::VerifyConnect,
            Some(CommandTag::Disconnect) => CommandKind::Disconnect,
            Some(CommandTag::Ping) => CommandKind::Ping,
            Some(CommandTag::SendReliable) => CommandKind::SendReliable,
            Some(CommandTag::SendUnreliable) => CommandKind::SendUnreliable,
            Some(CommandTag::SendReliableFragment) => CommandKind::SendReliableFragment,
            None => CommandKind::Unknown(v),
        }
    }
}

/// One command record within a datagram.
#[derive(Debug, Clone)]
pub struct Command {
    /// What kind of command this is.
    pub kind: CommandKind,
    /// Channel the command was sent on.
    pub channel_id: u8,
    /// Command flags; bit layout is undocumented upstream and unused here.
    pub flags: u8,
    /// Reserved byte, carried through unexamined.
    pub reserved: u8,
    /// The reliable sequence number, meaningful for reliable/fragment commands.
    pub reliable_sequence_number: u32,
    /// The command's opaque payload (`total_length - 12` bytes).
    pub payload: Vec<u8>,
}

/// The per-datagram envelope header and its commands. Transient: it
/// exists only for the duration of decoding one datagram.
#[derive(Debug, Clone)]
pub struct PhotonEnvelope {
    /// Peer identifier assigned by the game server.
    pub peer_id: u16,
    /// Whether the peer has CRC checking enabled.
    pub crc_enabled: u8,
    /// Declared number of commands; always equal to `commands.len()`.
    pub command_count: u8,
    /// Sender's millisecond timestamp.
    pub timestamp: u32,
    /// Connection challenge value.
    pub challenge: i32,
    /// The commands carried by this datagram, in wire order.
    pub commands: Vec<Command>,
}

/// Parses one UDP datagram body into a [`PhotonEnvelope`].
///
/// This either emits exactly `command_count` commands or none:
/// if any command's declared length runs past the end of the datagram, the
/// whole datagram is rejected and no partial envelope is returned.
pub fn parse_envelope(data: &[u8]) -> Result<PhotonEnvelope, DecodeError> {
    let mut r = ByteReader::new(data);

    let peer_id = r.read_u16()?;
    let crc_enabled = r.read_u8()?;
    let command_count = r.read_u8()?;
    let timestamp = r.read_u32()?;
    let challenge = r.read_i32()?;

    let mut commands = Vec::with_capacity(command_count as usize);
    for _ in 0..command_count {
        commands.push(parse_command(&mut r)?);
    }

    Ok(PhotonEnvelope {
        peer_id,
        crc_enabled,
        command_count,
        timestamp,
        challenge,
        commands,
    })
}

fn parse_command(r: &mut ByteReader) -> Result<Command, DecodeError> {
    let kind = CommandKind::from_u8(r.read_u8()?);
    let channel_id = r.read_u8()?;
    let flags = r.read_u8()?;
    let reserved = r.read_u8()?;
    let total_length = r.read_u32()?;
    let reliable_sequence_number = r.read_u32()?;

    let data_length = total_length
        .checked_sub(COMMAND_HEADER_LEN)
        .ok_or(DecodeError::MalformedDatagram)?;

    if data_length as usize > r.remaining() {
        return Err(DecodeError::MalformedDatagram);
    }

    let payload = r.read_bytes(data_length as usize)?.to_vec();

    Ok(Command {
        kind,
        channel_id,
        flags,
        reserved,
        reliable_sequence_number,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample_datagram() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes()); // peer id
        buf.push(0); // crc
        buf.push(1); // command count
        buf.extend_from_slice(&0u32.to_be_bytes()); // timestamp
        buf.extend_from_slice(&0i32.to_be_bytes()); // challenge

        // one command: kind=6 (SendReliable), length = 12 + 3 = 15
        buf.push(6);
        buf.push(0);
        buf.push(0);
        buf.push(0);
        buf.extend_from_slice(&15u32.to_be_bytes());
        buf.extend_from_slice(&42u32.to_be_bytes());
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        buf
    }

    #[test]
    fn parses_envelope_and_command_count_matches() {
        let datagram = sample_datagram();
        let envelope = parse_envelope(&datagram).unwrap();

        assert_eq!(envelope.command_count as usize, envelope.commands.len());
        assert_eq!(envelope.commands.len(), 1);
        assert_eq!(envelope.commands[0].kind, CommandKind::SendReliable);
        assert_eq!(envelope.commands[0].reliable_sequence_number, 42);
        assert_eq!(envelope.commands[0].payload, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn malformed_datagram_rejects_without_partial_dispatch() {
        let mut datagram = sample_datagram();
        // Claim two commands when only one fits.
        datagram[3] = 2;

        assert_matches!(parse_envelope(&datagram), Err(DecodeError::MalformedDatagram));
    }

    #[test]
    fn length_shorter_than_header_is_malformed() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(0);
        buf.push(1);
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0i32.to_be_bytes());

        buf.push(6);
        buf.push(0);
        buf.push(0);
        buf.push(0);
        buf.extend_from_slice(&4u32.to_be_bytes()); // shorter than header
        buf.extend_from_slice(&0u32.to_be_bytes());

        assert_matches!(parse_envelope(&buf), Err(DecodeError::MalformedDatagram));
    }

    #[test]
    fn unknown_command_kind_still_parses() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(0);
        buf.push(1);
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0i32.to_be_bytes());

        buf.push(200); // unknown kind
        buf.push(0);
        buf.push(0);
        buf.push(0);
        buf.extend_from_slice(&12u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());

        let envelope = parse_envelope(&buf).unwrap();
        assert_eq!(envelope.commands[0].kind, CommandKind::Unknown(200));
    }
}

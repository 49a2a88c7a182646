//! Reliable message header parsing, grounded on `photon_command.go`'s
//! `Command.ReliableMessage`).
//!
//! A `SendReliable` command's payload (after any fragment reassembly) is a
//! small header identifying what kind of message it carries, followed by
//! its parameter dictionary — decoded separately in [`super::params`].

use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;

use super::cursor::ByteReader;
use super::error::DecodeError;
use super::value::decode_value;

/// The documented reliable-message type bytes, decoded via `FromPrimitive`
/// the same way [`super::command::CommandTag`] decodes a command type byte.
/// `OperationResponseAlt` is a second spelling of `OperationResponse` the
/// peer uses interchangeably; [`parse_reliable_message`] normalizes it
/// before the rest of the header is read.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
enum MessageTag {
    OperationRequest = 2,
    OperationResponseAlt = 3,
    EventData = 4,
    OperationResponse = 7,
}

/// What a [`ReliableMessage`] carries, mirroring the three message types
/// the original peer distinguishes. Any other type byte is rejected rather
/// than modeled, since nothing downstream knows how to bind its fields.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageKind {
    /// A client-to-server operation call.
    OperationRequest,
    /// A server-to-client event.
    EventData,
    /// A server's response to an operation.
    OperationResponse,
}

/// A parsed reliable message header. `data` is left undecoded: it is the
/// parameter dictionary, handed to [`super::params::decode_parameters`].
#[derive(Debug, Clone)]
pub struct ReliableMessage {
    /// Leading signature byte; carried through unexamined.
    pub signature: u8,
    /// The message's kind.
    pub kind: MessageKind,
    /// Set when `kind` is [`MessageKind::OperationRequest`] or
    /// [`MessageKind::OperationResponse`].
    pub operation_code: Option<u8>,
    /// Set when `kind` is [`MessageKind::EventData`].
    pub event_code: Option<u8>,
    /// Set when `kind` is [`MessageKind::OperationResponse`].
    pub operation_response_code: Option<u16>,
    /// Set when `kind` is [`MessageKind::OperationResponse`]; a short,
    /// human-readable description the server attaches to its response.
    pub operation_debug_string: Option<String>,
    /// Declared number of entries in the parameter dictionary.
    pub parameter_count: u16,
    /// The undecoded parameter dictionary bytes.
    pub data: Vec<u8>,
}

/// Parses a `SendReliable` command's payload into a [`ReliableMessage`].
///
/// A type byte with the high bit set indicates an encrypted
/// message this decoder cannot read; `type == 3` is a second spelling of
/// [`MessageKind::OperationResponse`] the peer uses interchangeably with
/// `7` and is normalized to it here.
pub fn parse_reliable_message(payload: &[u8]) -> Result<ReliableMessage, DecodeError> {
    let mut r = ByteReader::new(payload);

    let signature = r.read_u8()?;
    let raw_message_type = r.read_u8()?;

    if raw_message_type > 128 {
        return Err(DecodeError::EncryptionNotSupported);
    }

    let message_type = match MessageTag::from_u8(raw_message_type) {
        Some(MessageTag::OperationResponseAlt) => MessageTag::OperationResponse,
        Some(tag) => tag,
        None => return Err(DecodeError::UnknownMessageType(raw_message_type)),
    };

    let mut operation_code = None;
    let mut event_code = None;
    let mut operation_response_code = None;
    let mut operation_debug_string = None;

    let kind = match message_type {
        MessageTag::OperationRequest => {
            operation_code = Some(r.read_u8()?);
            MessageKind::OperationRequest
        }
        MessageTag::EventData => {
            event_code = Some(r.read_u8()?);
            MessageKind::EventData
        }
        MessageTag::OperationResponse => {
            operation_code = Some(r.read_u8()?);
            operation_response_code = Some(r.read_u16()?);

            let param_type = r.read_u8()?;
            let value = decode_value(&mut r, param_type)?;
            operation_debug_string = Some(match value.as_string() {
                Some(s) => s.to_owned(),
                None => String::new(),
            });

            MessageKind::OperationResponse
        }
        MessageTag::OperationResponseAlt => unreachable!("normalized to OperationResponse above"),
    };

    let parameter_count = r.read_u16()?;
    let data = r.read_bytes(r.remaining())?.to_vec();

    Ok(ReliableMessage {
        signature,
        kind,
        operation_code,
        event_code,
        operation_response_code,
        operation_debug_string,
        parameter_count,
        data,
    })
}

//! Parameter dictionary decoding and the Move-event synthesis rule, grounded on
//! `decode_reliable_message.go`'s `DecodeReliableMessage`).

use std::collections::HashMap;

use super::cursor::ByteReader;
use super::error::DecodeError;
use super::value::{decode_value, TypedValue};

/// Parameter id conventionally holding the operation type code.
pub const OPERATION_DISCRIMINATOR_ID: u8 = 253;
/// Parameter id conventionally holding the event type code.
pub const EVENT_DISCRIMINATOR_ID: u8 = 252;
/// The event code identifying a Move event, which omits its own
/// discriminator parameter on the wire.
pub const MOVE_EVENT_CODE: u8 = 3;

/// A decoded parameter dictionary: parameter id to decoded value.
pub type Parameters = HashMap<u8, TypedValue>;

/// Decodes exactly `parameter_count` `(id, type, value)` triples from a
/// reliable message's parameter region.
///
/// Any single parameter failing to decode fails the whole
/// dictionary; there is no partial result. A duplicate id keeps the last
/// value written, so the resulting map may have fewer entries than
/// `parameter_count`.
pub fn decode_parameters(data: &[u8], parameter_count: u16) -> Result<Parameters, DecodeError> {
    let mut r = ByteReader::new(data);
    let mut params = HashMap::with_capacity(parameter_count as usize);

    for _ in 0..parameter_count {
        let id = r.read_u8()?;
        let type_tag = r.read_u8()?;
        let value = decode_value(&mut r, type_tag)?;
        params.insert(id, value);
    }

    Ok(params)
}

/// Applies the Move-event synthesis rule: a Move event's server payload
/// never carries its own event-code parameter, so one is manufactured
/// here before the dictionary reaches the type registry.
pub fn synthesize_move_event(event_code: u8, params: &mut Parameters) {
    if event_code == MOVE_EVENT_CODE && !params.contains_key(&EVENT_DISCRIMINATOR_ID) {
        params.insert(
            EVENT_DISCRIMINATOR_ID,
            TypedValue::Int16(MOVE_EVENT_CODE as i16),
        );
    }
}

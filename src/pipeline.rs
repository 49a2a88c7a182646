//! The owned pipeline value: no process-wide globals, so a host can run
//! more than one independently.
//!
//! The Go source keeps its registry, fragment buffer, and listener list as
//! fields on a single `Logger` value constructed once in `main`; there is no
//! process-global mutable state. [`PhotonPipeline`] is the direct Rust
//! analogue: a host constructs one, registers descriptors and listeners on
//! it, then feeds it commands from the capture loop.

use std::sync::Once;

use crate::protocol::command::{Command, CommandKind};
use crate::protocol::error::DecodeError;
use crate::protocol::fragment::{parse_reliable_fragment, FragmentBuffer};
use crate::protocol::message::parse_reliable_message;
use crate::protocol::params::{decode_parameters, synthesize_move_event};
use crate::registry::TypeRegistry;

/// Owns everything the decoding pipeline needs across the lifetime of one
/// capture session: the type registry (and through it, listeners and
/// disconnect callbacks) and the in-flight fragment reassembly cache.
///
/// Cloning shares the same registry (it's internally reference-counted) but
/// gives each clone its own fragment buffer; in practice a pipeline is
/// constructed once and driven from a single capture loop.
pub struct PhotonPipeline {
    registry: TypeRegistry,
    fragments: FragmentBuffer,
    encryption_warned: Once,
}

impl PhotonPipeline {
    /// Creates a pipeline with an empty registry and fragment buffer.
    pub fn new() -> Self {
        PhotonPipeline {
            registry: TypeRegistry::new(),
            fragments: FragmentBuffer::new(),
            encryption_warned: Once::new(),
        }
    }

    /// Access to the type registry, for registering descriptors and listeners.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Per-command classifier: routes a parsed [`Command`] to the
    /// reliable, unreliable, fragment, or disconnect path.
    pub fn handle_command(&mut self, command: Command) {
        match command.kind {
            CommandKind::SendReliable => self.handle_reliable_command(&command),
            CommandKind::SendUnreliable => self.handle_unreliable_command(command),
            CommandKind::Disconnect => self.registry.dispatch_disconnect(),
            CommandKind::SendReliableFragment => self.handle_fragment_command(&command),
            CommandKind::Acknowledge
            | CommandKind::Connect
            | CommandKind::VerifyConnect
            | CommandKind::Ping
            | CommandKind::Unknown(_) => {}
        }
    }

    /// An unreliable command's payload carries a 4-byte sequence prefix
    /// ahead of an otherwise ordinary reliable message body; the prefix is
    /// dropped and the rest is handled exactly like a reliable command.
    fn handle_unreliable_command(&mut self, command: Command) {
        let Some(body) = command.payload.get(4..) else {
            log::warn!("unreliable command shorter than its sequence prefix");
            return;
        };

        let synthetic = Command {
            kind: CommandKind::SendReliable,
            payload: body.to_vec(),
            ..command
        };
        self.handle_reliable_command(&synthetic);
    }

    fn handle_fragment_command(&mut self, command: &Command) {
        let fragment = match parse_reliable_fragment(command) {
            Ok(fragment) => fragment,
            Err(e) => {
                log::warn!("could not decode reliable fragment: {}", e);
                return;
            }
        };

        if let Some(reassembled) = self.fragments.offer(fragment) {
            self.handle_reliable_command(&reassembled);
        }
    }

    fn handle_reliable_command(&mut self, command: &Command) {
        let message = match parse_reliable_message(&command.payload) {
            Ok(message) => message,
            Err(DecodeError::EncryptionNotSupported) => {
                self.encryption_warned.call_once(|| {
                    log::warn!("encrypted messages are present on this stream and will be skipped");
                });
                return;
            }
            Err(e) => {
                log::warn!(
                    "could not decode reliable message: {} - {:02x?}",
                    e,
                    command.payload
                );
                return;
            }
        };

        let mut params = match decode_parameters(&message.data, message.parameter_count) {
            Ok(params) => params,
            Err(e) => {
                log::warn!(
                    "could not decode parameters: {} - {:02x?}",
                    e,
                    message.data
                );
                return;
            }
        };

        if let Some(event_code) = message.event_code {
            synthesize_move_event(event_code, &mut params);
        }

        self.registry.dispatch(message.kind, &params);
    }
}

impl Default for PhotonPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RecordDescriptor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn reliable_command(payload: Vec<u8>) -> Command {
        Command {
            kind: CommandKind::SendReliable,
            channel_id: 0,
            flags: 0,
            reserved: 0,
            reliable_sequence_number: 1,
            payload,
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Ping {
        amount: i32,
    }

    #[test]
    fn dispatches_an_operation_request_end_to_end() {
        let mut pipeline = PhotonPipeline::new();
        pipeline.registry().register_operation(
            6,
            RecordDescriptor::<Ping>::new().integer("amount", [245], |r, v| r.amount = v),
        );

        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);
        pipeline.registry().register_listener(move |value| {
            if let Some(record) = value.downcast_ref::<Ping>() {
                assert_eq!(record.amount, 123);
                seen_clone.store(true, Ordering::SeqCst);
            }
        });

        let mut payload = vec![0xF3, 2, 6]; // signature, OperationRequest, op code 6
        payload.extend_from_slice(&1u16.to_be_bytes()); // param count
        payload.push(245); // param id
        payload.push(crate::protocol::value::tag::INT16);
        payload.extend_from_slice(&123i16.to_be_bytes());

        pipeline.handle_command(reliable_command(payload));

        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn reassembles_a_fragmented_reliable_message_before_dispatch() {
        let mut pipeline = PhotonPipeline::new();
        pipeline
            .registry()
            .register_operation(6, RecordDescriptor::<Ping>::new());

        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);
        pipeline.registry().register_listener(move |value| {
            if value.downcast_ref::<Ping>().is_some() {
                seen_clone.store(true, Ordering::SeqCst);
            }
        });

        let mut full_payload = vec![0xF3, 2, 6];
        full_payload.extend_from_slice(&0u16.to_be_bytes());

        let half = full_payload.len() / 2;
        let chunks = [&full_payload[..half], &full_payload[half..]];

        for (i, chunk) in chunks.iter().enumerate() {
            let mut fragment_payload = Vec::new();
            fragment_payload.extend_from_slice(&7u32.to_be_bytes()); // sequence number
            fragment_payload.extend_from_slice(&(chunks.len() as i32).to_be_bytes());
            fragment_payload.extend_from_slice(&(i as i32).to_be_bytes());
            fragment_payload.extend_from_slice(&(full_payload.len() as i32).to_be_bytes());
            fragment_payload.extend_from_slice(&((i * half) as i32).to_be_bytes());
            fragment_payload.extend_from_slice(chunk);

            let command = Command {
                kind: CommandKind::SendReliableFragment,
                channel_id: 0,
                flags: 0,
                reserved: 0,
                reliable_sequence_number: 7,
                payload: fragment_payload,
            };
            pipeline.handle_command(command);
        }

        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn encrypted_reliable_message_is_dropped_without_panicking() {
        let mut pipeline = PhotonPipeline::new();
        pipeline.handle_command(reliable_command(vec![0xF3, 200]));
    }

    #[test]
    fn disconnect_command_invokes_registered_callback() {
        let mut pipeline = PhotonPipeline::new();
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = Arc::clone(&called);
        pipeline
            .registry()
            .register_disconnect(move || called_clone.store(true, Ordering::SeqCst));

        pipeline.handle_command(Command {
            kind: CommandKind::Disconnect,
            channel_id: 0,
            flags: 0,
            reserved: 0,
            reliable_sequence_number: 0,
            payload: Vec::new(),
        });

        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn unreliable_command_strips_sequence_prefix_before_dispatch() {
        let mut pipeline = PhotonPipeline::new();
        pipeline.registry().register_operation(
            6,
            RecordDescriptor::<Ping>::new().integer("amount", [245], |r, v| r.amount = v),
        );

        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);
        pipeline.registry().register_listener(move |value| {
            if let Some(record) = value.downcast_ref::<Ping>() {
                assert_eq!(record.amount, 5);
                seen_clone.store(true, Ordering::SeqCst);
            }
        });

        let mut inner = vec![0xF3, 2, 6];
        inner.extend_from_slice(&1u16.to_be_bytes());
        inner.push(245);
        inner.push(crate::protocol::value::tag::INT16);
        inner.extend_from_slice(&5i16.to_be_bytes());

        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&inner);

        pipeline.handle_command(Command {
            kind: CommandKind::SendUnreliable,
            channel_id: 0,
            flags: 0,
            reserved: 0,
            reliable_sequence_number: 0,
            payload,
        });

        assert!(seen.load(Ordering::SeqCst));
    }

}

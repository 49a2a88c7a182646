//! Reassembly of fragmented reliable messages, grounded on `fragment_buffer.go`.
//!
//! A message too large for one datagram arrives as a run of
//! `SendReliableFragment` commands sharing a sequence number. This module
//! parses those commands and glues the run back into a single
//! `SendReliable` command once every fragment has arrived.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;

use super::command::{Command, CommandKind};
use super::cursor::ByteReader;
use super::error::DecodeError;

/// An upper bound on in-flight fragment runs. A peer that starts more
/// reassemblies than this without finishing any of them will have its
/// oldest, stalled run silently evicted rather than leak memory forever.
pub const FRAGMENT_BUFFER_CAPACITY: usize = 128;

/// A single `SendReliableFragment` command's header and payload.
#[derive(Debug, Clone)]
pub struct ReliableFragment {
    /// Sequence number shared by every fragment of the same message.
    pub sequence_number: u32,
    /// Total number of fragments that make up the message.
    pub fragment_count: i32,
    /// This fragment's index within the run.
    pub fragment_number: i32,
    /// Total length of the reassembled message, in bytes.
    pub total_length: i32,
    /// This fragment's byte offset within the reassembled message.
    pub fragment_offset: i32,
    /// This fragment's slice of the message.
    pub data: Vec<u8>,
}

/// Parses a [`Command`] of kind [`CommandKind::SendReliableFragment`] into
/// its [`ReliableFragment`] header and payload.
pub fn parse_reliable_fragment(command: &Command) -> Result<ReliableFragment, DecodeError> {
    let mut r = ByteReader::new(&command.payload);

    let sequence_number = r.read_u32()?;
    let fragment_count = r.read_i32()?;
    let fragment_number = r.read_i32()?;
    let total_length = r.read_i32()?;
    let fragment_offset = r.read_i32()?;
    let data = r.read_bytes(r.remaining())?.to_vec();

    Ok(ReliableFragment {
        sequence_number,
        fragment_count,
        fragment_number,
        total_length,
        fragment_offset,
        data,
    })
}

struct FragmentBufferEntry {
    sequence_number: u32,
    fragments_needed: usize,
    fragments: HashMap<i32, Vec<u8>>,
}

impl FragmentBufferEntry {
    fn finished(&self) -> bool {
        self.fragments.len() == self.fragments_needed
    }

    fn assemble(&mut self) -> Command {
        let mut data = Vec::new();
        for i in 0..self.fragments_needed as i32 {
            if let Some(chunk) = self.fragments.remove(&i) {
                data.extend_from_slice(&chunk);
            }
        }

        Command {
            kind: CommandKind::SendReliable,
            channel_id: 0,
            flags: 0,
            reserved: 0,
            reliable_sequence_number: self.sequence_number,
            payload: data,
        }
    }
}

/// An LRU-bounded store of in-progress fragment reassemblies.
pub struct FragmentBuffer {
    cache: LruCache<u32, FragmentBufferEntry>,
}

impl FragmentBuffer {
    /// Creates a fragment buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(FRAGMENT_BUFFER_CAPACITY)
    }

    /// Creates a fragment buffer holding at most `capacity` in-flight runs.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        FragmentBuffer {
            cache: LruCache::new(capacity),
        }
    }

    /// Offers a fragment to the buffer. Returns the reassembled
    /// `SendReliable` command once every fragment of its run has been
    /// seen, or `None` while the run is still incomplete.
    pub fn offer(&mut self, fragment: ReliableFragment) -> Option<Command> {
        let seq = fragment.sequence_number;

        let entry = self.cache.get_or_insert_mut(seq, || FragmentBufferEntry {
            sequence_number: seq,
            fragments_needed: fragment.fragment_count.max(0) as usize,
            fragments: HashMap::new(),
        });
        entry.fragments.insert(fragment.fragment_number, fragment.data);

        if entry.finished() {
            let mut entry = self.cache.pop(&seq).expect("entry just inserted");
            Some(entry.assemble())
        } else {
            None
        }
    }
}

impl Default for FragmentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(seq: u32, count: i32, number: i32, data: &[u8]) -> ReliableFragment {
        ReliableFragment {
            sequence_number: seq,
            fragment_count: count,
            fragment_number: number,
            total_length: data.len() as i32 * count,
            fragment_offset: data.len() as i32 * number,
            data: data.to_vec(),
        }
    }

    #[test]
    fn assembles_once_every_fragment_arrives() {
        let mut buf = FragmentBuffer::new();

        assert!(buf.offer(fragment(1, 2, 0, &[0xAA])).is_none());
        let assembled = buf.offer(fragment(1, 2, 1, &[0xBB])).unwrap();

        assert_eq!(assembled.kind, CommandKind::SendReliable);
        assert_eq!(assembled.payload, vec![0xAA, 0xBB]);
        assert_eq!(assembled.reliable_sequence_number, 1);
    }

    #[test]
    fn out_of_order_fragments_still_assemble_in_order() {
        let mut buf = FragmentBuffer::new();

        assert!(buf.offer(fragment(2, 3, 2, &[0x03])).is_none());
        assert!(buf.offer(fragment(2, 3, 0, &[0x01])).is_none());
        let assembled = buf.offer(fragment(2, 3, 1, &[0x02])).unwrap();

        assert_eq!(assembled.payload, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn distinct_sequences_do_not_interfere() {
        let mut buf = FragmentBuffer::new();

        assert!(buf.offer(fragment(1, 2, 0, &[0xAA])).is_none());
        assert!(buf.offer(fragment(2, 2, 0, &[0xCC])).is_none());

        let first = buf.offer(fragment(1, 2, 1, &[0xBB])).unwrap();
        assert_eq!(first.payload, vec![0xAA, 0xBB]);

        let second = buf.offer(fragment(2, 2, 1, &[0xDD])).unwrap();
        assert_eq!(second.payload, vec![0xCC, 0xDD]);
    }

    #[test]
    fn eviction_drops_the_oldest_unfinished_run() {
        let mut buf = FragmentBuffer::with_capacity(1);

        assert!(buf.offer(fragment(1, 2, 0, &[0xAA])).is_none());
        // A second run starts before the first finishes; capacity 1 evicts run 1.
        assert!(buf.offer(fragment(2, 2, 0, &[0xCC])).is_none());

        // Completing run 1 now starts a fresh entry rather than assembling,
        // since its prior partial state was evicted.
        assert!(buf.offer(fragment(1, 2, 1, &[0xBB])).is_none());
    }
}

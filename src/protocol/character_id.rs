//! Character-ID byte reordering.
//!
//! A character ID arrives as 16 signed bytes in a wire order that is not
//! RFC 4122. Mirrors `protocol.DecodeCharacterID` in the Go original.

use uuid::Uuid;

/// Decodes a character ID from its wire byte order into a canonical
/// [`Uuid`]. A slice whose length isn't 16 decodes to the nil UUID rather
/// than erroring, matching how the `EvPartyJoined`/`OpJoinGame` fields are decoded
/// that rely on this never panicking on attacker-controlled lengths.
pub fn decode_character_id(bytes: &[i8]) -> Uuid {
    if bytes.len() != 16 {
        return Uuid::nil();
    }

    let mut b = [0u8; 16];
    for (dst, &src) in b.iter_mut().zip(bytes) {
        *dst = src as u8;
    }

    b.swap(0, 3);
    b.swap(1, 2);
    b.swap(4, 5);
    b.swap(6, 7);

    Uuid::from_bytes(b)
}

//! The typed-value decoder: a small, self-describing dynamic type system
//! decoded from a tag byte plus a tag-directed payload.
//!
//! Mirrors `protocol/photon/decode_reliable_message.go`'s `decodeType` and
//! its slice/dictionary helpers, but as a closed Rust sum type instead of
//! `interface{}`.

use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;

use super::cursor::ByteReader;
use super::error::DecodeError;

/// Type tag bytes, as observed on the wire. Two values are accepted as
/// alternate spellings of another tag (`0` for `Nil`, `7` for `Int16`);
/// [`Tag::decode`] folds both into their canonical discriminant before
/// looking the byte up, the same way `MessageTag` folds the alternate
/// operation-response type byte into `7`.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
pub enum Tag {
    Nil = 42,
    Int8 = 98,
    Int16 = 107,
    Int32 = 105,
    Int64 = 108,
    Float32 = 102,
    Double = 100,
    String = 115,
    Boolean = 111,
    Int8Slice = 120,
    Slice = 121,
    Dictionary = 68,
}

impl Tag {
    /// Resolves a raw wire tag byte to a [`Tag`], folding in the two
    /// alternate spellings observed on the wire. Unknown bytes fail with
    /// the raw byte (not the normalized one), so the error reports what
    /// the peer actually sent.
    pub fn decode(raw: u8) -> Result<Self, DecodeError> {
        let normalized = match raw {
            0 => Tag::Nil as u8,
            7 => Tag::Int16 as u8,
            other => other,
        };
        Tag::from_u8(normalized).ok_or(DecodeError::UnknownTypeTag(raw))
    }
}

/// Raw tag byte constants, for code that needs the wire byte itself rather
/// than a decoded [`Tag`] — storing an array's element type alongside its
/// decoded children, and building literal test fixtures.
pub mod tag {
    use super::Tag;

    pub const NIL: u8 = Tag::Nil as u8;
    pub const INT8: u8 = Tag::Int8 as u8;
    pub const INT16: u8 = Tag::Int16 as u8;
    pub const INT32: u8 = Tag::Int32 as u8;
    pub const INT64: u8 = Tag::Int64 as u8;
    pub const FLOAT32: u8 = Tag::Float32 as u8;
    pub const DOUBLE: u8 = Tag::Double as u8;
    pub const STRING: u8 = Tag::String as u8;
    pub const BOOLEAN: u8 = Tag::Boolean as u8;
    pub const INT8_SLICE: u8 = Tag::Int8Slice as u8;
    pub const SLICE: u8 = Tag::Slice as u8;
    pub const DICTIONARY: u8 = Tag::Dictionary as u8;
}

/// A decoded Photon parameter value.
///
/// `Array` covers both the wire's "typed array" (a flat, homogeneously
/// typed slice) and "array of array"/"array of byteslice" cases: rather
/// than parametrizing the variant by element type (which a closed Rust enum
/// can't express directly), the element type tag travels alongside the
/// decoded children, which are themselves `TypedValue`s of that tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// The absence of a value.
    Nil,
    /// A signed 8-bit integer.
    Int8(i8),
    /// A signed 16-bit integer.
    Int16(i16),
    /// A signed 32-bit integer.
    Int32(i32),
    /// A signed 64-bit integer.
    Int64(i64),
    /// A 32-bit float.
    Float32(f32),
    /// A 64-bit float.
    Double(f64),
    /// A boolean.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
    /// A raw byte slice, encoded over the wire as signed bytes.
    ByteSlice(Vec<i8>),
    /// A homogeneous array of values of the given element type tag.
    Array(u8, Vec<TypedValue>),
    /// A mapping of decoded key to decoded value, in insertion order
    /// (last write for a duplicate key wins).
    Dictionary(Vec<(TypedValue, TypedValue)>),
}

impl TypedValue {
    /// A short name of this value's shape, for type-mismatch error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypedValue::Nil => "nil",
            TypedValue::Int8(_) => "int8",
            TypedValue::Int16(_) => "int16",
            TypedValue::Int32(_) => "int32",
            TypedValue::Int64(_) => "int64",
            TypedValue::Float32(_) => "float32",
            TypedValue::Double(_) => "double",
            TypedValue::Bool(_) => "bool",
            TypedValue::String(_) => "string",
            TypedValue::ByteSlice(_) => "byte slice",
            TypedValue::Array(..) => "array",
            TypedValue::Dictionary(_) => "dictionary",
        }
    }

    /// Widens any integer variant to `i64`. Used by the `Integer`/`Long`
    /// field coercions in the registry.
    pub fn as_widened_integer(&self) -> Option<i64> {
        match *self {
            TypedValue::Int8(v) => Some(v as i64),
            TypedValue::Int16(v) => Some(v as i64),
            TypedValue::Int32(v) => Some(v as i64),
            TypedValue::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the inner string, if this is a [`TypedValue::String`].
    /// `Nil` also yields an empty string, matching the debug-string field's
    /// treatment of a response that carries no message.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s.as_str()),
            TypedValue::Nil => Some(""),
            _ => None,
        }
    }
}

/// Decodes one value given its type tag.
pub fn decode_value(r: &mut ByteReader, type_tag: u8) -> Result<TypedValue, DecodeError> {
    match Tag::decode(type_tag)? {
        Tag::Nil => Ok(TypedValue::Nil),
        Tag::Int8 => Ok(TypedValue::Int8(r.read_i8()?)),
        Tag::Int16 => Ok(TypedValue::Int16(r.read_i16()?)),
        Tag::Int32 => Ok(TypedValue::Int32(r.read_i32()?)),
        Tag::Int64 => Ok(TypedValue::Int64(r.read_i64()?)),
        Tag::Float32 => Ok(TypedValue::Float32(r.read_f32()?)),
        Tag::Double => Ok(TypedValue::Double(r.read_f64()?)),
        Tag::Boolean => decode_bool(r).map(TypedValue::Bool),
        Tag::String => Ok(TypedValue::String(r.read_string()?)),
        Tag::Int8Slice => Ok(TypedValue::ByteSlice(r.read_i8_slice()?)),
        Tag::Slice => decode_array(r),
        Tag::Dictionary => decode_dictionary(r),
    }
}

fn decode_bool(r: &mut ByteReader) -> Result<bool, DecodeError> {
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::BadBoolean(other)),
    }
}

fn decode_array(r: &mut ByteReader) -> Result<TypedValue, DecodeError> {
    let length = r.read_u16()? as usize;
    let element_tag = r.read_u8()?;

    let mut items = Vec::with_capacity(length.min(4096));
    for _ in 0..length {
        // Each element is self-delimited by its own tag's decode routine
        // (e.g. a nested `Slice` reads its own length+type header, and a
        // nested `Int8Slice` reads its own length prefix), so no extra tag
        // byte precedes individual elements here.
        items.push(decode_value(r, element_tag)?);
    }

    Ok(TypedValue::Array(element_tag, items))
}

fn decode_dictionary(r: &mut ByteReader) -> Result<TypedValue, DecodeError> {
    let declared_key_tag = r.read_u8()?;
    let declared_value_tag = r.read_u8()?;
    let size = r.read_u16()? as usize;

    let mut entries: Vec<(TypedValue, TypedValue)> = Vec::with_capacity(size.min(4096));
    for _ in 0..size {
        let key_tag = resolve_entry_tag(r, declared_key_tag)?;
        let key = decode_value(r, key_tag)?;
        let value_tag = resolve_entry_tag(r, declared_value_tag)?;
        let value = decode_value(r, value_tag)?;

        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    Ok(TypedValue::Dictionary(entries))
}

/// If the dictionary declared its key (or value) type as `Nil`, each entry
/// carries its own override tag; otherwise every entry uses the declared tag.
fn resolve_entry_tag(r: &mut ByteReader, declared: u8) -> Result<u8, DecodeError> {
    if declared == 0 || declared == tag::NIL {
        r.read_u8()
    } else {
        Ok(declared)
    }
}

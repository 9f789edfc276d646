//! Schema-less decoder for tagged-record binary payloads.
//!
//! Some vendors persist usage in an undocumented protobuf-style cache. There
//! is no schema to compile against, so the decoder only knows the generic
//! framing rules: every record starts with a varint key carrying the field
//! number and wire type.
//!
//! | Wire type | Payload          |
//! |-----------|------------------|
//! | 0         | varint           |
//! | 1         | 8 bytes, LE      |
//! | 2         | length-delimited |
//! | 5         | 4 bytes, LE      |
//!
//! Unknown field numbers are kept like any other; interpreting them is up to
//! the caller (see [`RawValue::as_f32`], [`RawValue::as_message`], ...).
//!
//! ```
//! use meterbar_core::wire;
//!
//! // field 1 = varint 150
//! let msg = wire::decode(&[0x08, 0x96, 0x01]).unwrap();
//! assert_eq!(msg.first(1).and_then(|v| v.as_u64()), Some(150));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Longest legal varint encoding.
const MAX_VARINT_BYTES: usize = 10;

// ============================================================================
// Errors
// ============================================================================

/// Why a buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    /// Buffer ended inside a varint.
    #[error("truncated varint")]
    TruncatedVarint,
    /// Varint longer than ten bytes.
    #[error("varint exceeds 10 bytes")]
    VarintOverflow,
    /// Declared length runs past the end of the buffer.
    #[error("declared length {declared} exceeds remaining {remaining} bytes")]
    LengthExceedsBuffer {
        /// Length announced by the record.
        declared: u64,
        /// Bytes actually left.
        remaining: usize,
    },
    /// Buffer ended inside a fixed-width value.
    #[error("fixed{bits} value truncated")]
    TruncatedFixed {
        /// 32 or 64.
        bits: u8,
    },
    /// Wire type outside {0, 1, 2, 5}.
    #[error("unknown wire type {0}")]
    UnknownWireType(u8),
    /// Field number 0 or above the 32-bit range.
    #[error("invalid field number {0}")]
    InvalidFieldNumber(u64),
}

/// Decoder errors.
///
/// Carries the field path and offset only; payload bytes are never included.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The buffer does not follow the framing rules.
    #[error("malformed input at {} (offset {offset}): {reason}", FieldPath(.path))]
    MalformedInput {
        /// Field numbers leading to the failing message; empty at the root.
        path: Vec<u32>,
        /// Byte offset within the failing message.
        offset: usize,
        /// What went wrong.
        reason: MalformedReason,
    },
}

impl WireError {
    /// Returns the field path of the failure.
    pub fn path(&self) -> &[u32] {
        match self {
            Self::MalformedInput { path, .. } => path,
        }
    }

    fn nested_under(self, prefix: &[u32]) -> Self {
        match self {
            Self::MalformedInput {
                path,
                offset,
                reason,
            } => {
                let mut full = prefix.to_vec();
                full.extend(path);
                Self::MalformedInput {
                    path: full,
                    offset,
                    reason,
                }
            }
        }
    }
}

struct FieldPath<'a>(&'a [u32]);

impl fmt::Display for FieldPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

// ============================================================================
// Raw Values
// ============================================================================

/// Wire types the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// Base-128 varint.
    Varint,
    /// Eight little-endian bytes.
    Fixed64,
    /// Length-prefixed bytes.
    LengthDelimited,
    /// Four little-endian bytes.
    Fixed32,
}

impl WireType {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "bytes",
            Self::Fixed32 => "fixed32",
        })
    }
}

/// One undecoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Wire type 0.
    Varint(u64),
    /// Wire type 1.
    Fixed64([u8; 8]),
    /// Wire type 2.
    Bytes(Vec<u8>),
    /// Wire type 5.
    Fixed32([u8; 4]),
}

impl RawValue {
    /// Returns the wire type this value was encoded with.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::Bytes(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }

    /// Unsigned integer view of a varint or fixed value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Varint(v) => Some(*v),
            Self::Fixed64(b) => Some(u64::from_le_bytes(*b)),
            Self::Fixed32(b) => Some(u64::from(u32::from_le_bytes(*b))),
            Self::Bytes(_) => None,
        }
    }

    /// Signed view of a zig-zag encoded varint (`sint64`).
    pub fn as_i64_zigzag(&self) -> Option<i64> {
        match self {
            #[allow(clippy::cast_possible_wrap)]
            Self::Varint(v) => Some(((v >> 1) as i64) ^ -((v & 1) as i64)),
            _ => None,
        }
    }

    /// IEEE-754 single-precision view of a fixed32 value.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Fixed32(b) => Some(f32::from_le_bytes(*b)),
            _ => None,
        }
    }

    /// IEEE-754 double-precision view of a fixed64 value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Fixed64(b) => Some(f64::from_le_bytes(*b)),
            _ => None,
        }
    }

    /// Raw bytes of a length-delimited value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// UTF-8 view of a length-delimited value.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Decodes a length-delimited value as a nested message.
    ///
    /// Returns `None` for non-length-delimited values.
    ///
    /// # Errors
    ///
    /// Returns `WireError::MalformedInput` if the payload is not a valid
    /// message.
    pub fn as_message(&self) -> Option<Result<WireMessage, WireError>> {
        self.as_bytes().map(decode)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A decoded message: field number to values in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireMessage {
    fields: BTreeMap<u32, Vec<RawValue>>,
}

impl WireMessage {
    /// Returns the first value of a field.
    pub fn first(&self, field: u32) -> Option<&RawValue> {
        self.fields.get(&field).and_then(|values| values.first())
    }

    /// Returns every value of a field, in encounter order.
    pub fn all(&self, field: u32) -> &[RawValue] {
        self.fields.get(&field).map_or(&[], Vec::as_slice)
    }

    /// Follows a chain of field numbers through nested messages and returns
    /// the first value at the end of it.
    ///
    /// Every hop but the last must be a length-delimited message.
    ///
    /// # Errors
    ///
    /// Returns `WireError::MalformedInput` with the full path if an
    /// intermediate payload fails to decode.
    pub fn path(&self, fields: &[u32]) -> Result<Option<RawValue>, WireError> {
        let Some((&last, hops)) = fields.split_last() else {
            return Ok(None);
        };
        let mut current = self.clone();
        for (depth, &field) in hops.iter().enumerate() {
            let Some(value) = current.first(field) else {
                return Ok(None);
            };
            match value.as_message() {
                Some(Ok(next)) => current = next,
                Some(Err(e)) => return Err(e.nested_under(&fields[..=depth])),
                None => return Ok(None),
            }
        }
        Ok(current.first(last).cloned())
    }

    /// Iterates over fields in ascending field-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[RawValue])> {
        self.fields.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Returns true if no fields were decoded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of distinct field numbers.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one message level.
///
/// # Errors
///
/// Returns `WireError::MalformedInput` for truncated input, oversized
/// lengths, unknown wire types or an invalid field number. No partial
/// message is ever returned.
pub fn decode(bytes: &[u8]) -> Result<WireMessage, WireError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let mut fields: BTreeMap<u32, Vec<RawValue>> = BTreeMap::new();

    while !reader.at_end() {
        let key_offset = reader.pos;
        let key = reader.varint()?;
        let field = u32::try_from(key >> 3)
            .ok()
            .filter(|f| *f != 0)
            .ok_or_else(|| malformed(key_offset, MalformedReason::InvalidFieldNumber(key >> 3)))?;
        #[allow(clippy::cast_possible_truncation)]
        let tag = (key & 0x7) as u8;
        let wire_type = WireType::from_tag(tag)
            .ok_or_else(|| malformed(key_offset, MalformedReason::UnknownWireType(tag)))?;

        let value = match wire_type {
            WireType::Varint => RawValue::Varint(reader.varint()?),
            WireType::Fixed64 => RawValue::Fixed64(reader.fixed::<8>()?),
            WireType::Fixed32 => RawValue::Fixed32(reader.fixed::<4>()?),
            WireType::LengthDelimited => RawValue::Bytes(reader.length_delimited()?.to_vec()),
        };
        fields.entry(field).or_default().push(value);
    }

    Ok(WireMessage { fields })
}

fn malformed(offset: usize, reason: MalformedReason) -> WireError {
    WireError::MalformedInput {
        path: Vec::new(),
        offset,
        reason,
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn varint(&mut self) -> Result<u64, WireError> {
        let start = self.pos;
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let Some(&byte) = self.buf.get(self.pos) else {
                return Err(malformed(start, MalformedReason::TruncatedVarint));
            };
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed(start, MalformedReason::VarintOverflow))
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let start = self.pos;
        let Some(slice) = self.buf.get(self.pos..self.pos + N) else {
            #[allow(clippy::cast_possible_truncation)]
            let bits = (N * 8) as u8;
            return Err(malformed(start, MalformedReason::TruncatedFixed { bits }));
        };
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos += N;
        Ok(out)
    }

    fn length_delimited(&mut self) -> Result<&'a [u8], WireError> {
        let start = self.pos;
        let declared = self.varint()?;
        let remaining = self.remaining();
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| *len <= remaining)
            .ok_or_else(|| {
                malformed(
                    start,
                    MalformedReason::LengthExceedsBuffer {
                        declared,
                        remaining,
                    },
                )
            })?;
        let buf = self.buf;
        let slice = &buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

// ============================================================================
// Tests
// ============================================================================

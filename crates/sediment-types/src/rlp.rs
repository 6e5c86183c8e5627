//! RLP encoding and decoding helpers.
//!
//! Trie nodes and account records need byte-exact layouts, so the codec is
//! written out by hand rather than pulled from a serde framework.

use primitive_types::U256;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("unexpected end of RLP input")]
    UnexpectedEof,

    #[error("expected RLP string, found list")]
    ExpectedString,

    #[error("expected RLP list, found string")]
    ExpectedList,

    #[error("non-minimal or oversized RLP length encoding")]
    InvalidLength,

    #[error("integer field too large: {0} bytes")]
    IntegerOverflow(usize),

    #[error("trailing bytes after RLP item")]
    TrailingBytes,
}

// =============================================================================
// ENCODING
// =============================================================================

/// RLP-encode a byte slice.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 9);
    append_bytes(&mut out, data);
    out
}

/// Append an RLP-encoded byte slice to `out`.
pub fn append_bytes(out: &mut Vec<u8>, data: &[u8]) {
    if data.len() == 1 && data[0] < 0x80 {
        out.push(data[0]);
    } else if data.len() < 56 {
        out.push(0x80 + data.len() as u8);
        out.extend_from_slice(data);
    } else {
        let len_bytes = minimal_be(data.len() as u64);
        out.push(0xb7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
    }
}

/// Append an RLP-encoded u64 (minimal big-endian, zero is the empty string).
pub fn append_u64(out: &mut Vec<u8>, value: u64) {
    if value == 0 {
        out.push(0x80);
    } else {
        append_bytes(out, &minimal_be(value));
    }
}

/// Append an RLP-encoded U256 (minimal big-endian, zero is the empty string).
pub fn append_u256(out: &mut Vec<u8>, value: &U256) {
    if value.is_zero() {
        out.push(0x80);
    } else {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        let start = buf.iter().position(|&b| b != 0).unwrap_or(31);
        append_bytes(out, &buf[start..]);
    }
}

/// Wrap already-encoded payload bytes in an RLP list header.
pub fn wrap_list(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    if payload.len() < 56 {
        out.push(0xc0 + payload.len() as u8);
    } else {
        let len_bytes = minimal_be(payload.len() as u64);
        out.push(0xf7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
    }
    out.extend(payload);
    out
}

/// Minimal big-endian representation of a non-zero integer.
fn minimal_be(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

// =============================================================================
// DECODING
// =============================================================================

/// Cursor over an RLP payload, consuming one item at a time.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// True once every item has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the next item, which must be a string; returns its payload.
    pub fn next_bytes(&mut self) -> Result<&'a [u8], RlpError> {
        let (kind, payload, rest) = split(self.buf)?;
        if kind != Kind::String {
            return Err(RlpError::ExpectedString);
        }
        self.buf = rest;
        Ok(payload)
    }

    /// Consume the next item, which must be a list; returns a reader over
    /// its payload.
    pub fn next_list(&mut self) -> Result<Reader<'a>, RlpError> {
        let (kind, payload, rest) = split(self.buf)?;
        if kind != Kind::List {
            return Err(RlpError::ExpectedList);
        }
        self.buf = rest;
        Ok(Reader::new(payload))
    }

    /// Consume the next string item and interpret it as a u64.
    pub fn next_u64(&mut self) -> Result<u64, RlpError> {
        let payload = self.next_bytes()?;
        if payload.len() > 8 {
            return Err(RlpError::IntegerOverflow(payload.len()));
        }
        let mut value = 0u64;
        for &b in payload {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    /// Consume the next string item and interpret it as a U256.
    pub fn next_u256(&mut self) -> Result<U256, RlpError> {
        let payload = self.next_bytes()?;
        if payload.len() > 32 {
            return Err(RlpError::IntegerOverflow(payload.len()));
        }
        Ok(U256::from_big_endian(payload))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    List,
}

/// Split one RLP item off the front of `buf`: (kind, payload, rest).
fn split(buf: &[u8]) -> Result<(Kind, &[u8], &[u8]), RlpError> {
    let first = *buf.first().ok_or(RlpError::UnexpectedEof)?;
    match first {
        0x00..=0x7f => Ok((Kind::String, &buf[..1], &buf[1..])),
        0x80..=0xb7 => take(buf, 1, (first - 0x80) as usize, Kind::String),
        0xb8..=0xbf => take_long(buf, (first - 0xb7) as usize, Kind::String),
        0xc0..=0xf7 => take(buf, 1, (first - 0xc0) as usize, Kind::List),
        0xf8..=0xff => take_long(buf, (first - 0xf7) as usize, Kind::List),
    }
}

fn take(buf: &[u8], header: usize, len: usize, kind: Kind) -> Result<(Kind, &[u8], &[u8]), RlpError> {
    if buf.len() < header + len {
        return Err(RlpError::UnexpectedEof);
    }
    Ok((kind, &buf[header..header + len], &buf[header + len..]))
}

fn take_long(buf: &[u8], len_of_len: usize, kind: Kind) -> Result<(Kind, &[u8], &[u8]), RlpError> {
    if buf.len() < 1 + len_of_len {
        return Err(RlpError::UnexpectedEof);
    }
    let len_bytes = &buf[1..1 + len_of_len];
    if len_bytes[0] == 0 {
        return Err(RlpError::InvalidLength);
    }
    let mut len = 0usize;
    for &b in len_bytes {
        len = len.checked_mul(256).ok_or(RlpError::InvalidLength)? + b as usize;
    }
    if len < 56 {
        return Err(RlpError::InvalidLength);
    }
    take(buf, 1 + len_of_len, len, kind)
}

/// Decode a top-level list, rejecting trailing garbage.
pub fn decode_list(buf: &[u8]) -> Result<Reader<'_>, RlpError> {
    let mut outer = Reader::new(buf);
    let inner = outer.next_list()?;
    if !outer.is_empty() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(inner)
}

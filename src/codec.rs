//! Binary wire format for values
//!
//! A value is written depth-first: `0xFF` introduces a pair followed by its
//! `first` and `rest`, `0x80` is the empty atom, a byte up to `0x7F` is a one
//! byte atom holding itself, and any other atom gets a length header whose
//! leading one bits count the header bytes.
use bytes::Bytes;
use tracing::trace;

use crate::value::{Atom, Value};

const MAX_SINGLE_BYTE: u8 = 0x7F;
const CONS_BOX_MARKER: u8 = 0xFF;
const NIL_MARKER: u8 = 0x80;

/// First atom length that no header can express
pub const MAX_ATOM_LEN: u64 = 0x4_0000_0000;

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
#[error("buffer too short: size {size}, pos {pos}, left {left}, need {need}")]
pub struct BufferTooShort {
    pub size: usize,
    pub pos: usize,
    pub left: usize,
    pub need: usize,
}

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum DecodeError {
    #[error("bad encoding at pos {pos}")]
    MalformedEncoding {
        pos: usize,
        #[source]
        source: BufferTooShort,
    },
    #[error("buffer is not empty: size {size}, pos {pos}")]
    TrailingBytes { size: usize, pos: usize },
    #[error("blob too large: header at pos {pos} declares {size} bytes")]
    BlobTooLarge { pos: usize, size: u64 },
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum EncodeError {
    #[error("atom of {len} bytes is too large to encode")]
    AtomTooLarge { len: usize },
}

/// A cursor over a byte slice that knows how far it has read
#[derive(Debug, Clone)]
pub struct ParseBuf<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ParseBuf<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, need: usize) -> Result<&'a [u8], BufferTooShort> {
        if need > self.remaining() {
            return Err(BufferTooShort {
                size: self.buf.len(),
                pos: self.pos,
                left: self.remaining(),
                need,
            });
        }
        let chunk = &self.buf[self.pos..self.pos + need];
        self.pos += need;
        Ok(chunk)
    }

    pub fn u8(&mut self) -> Result<u8, BufferTooShort> {
        Ok(self.take(1)?[0])
    }

    /// Bytes consumed between `start` and the current position
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.buf[start.min(self.pos)..self.pos]
    }

    pub fn ensure_empty(&self) -> Result<(), DecodeError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes {
                size: self.buf.len(),
                pos: self.pos,
            })
        }
    }
}

enum ReadOp {
    Read,
    Cons,
}

fn read_atom(buf: &mut ParseBuf<'_>, header: u8, pos: usize) -> Result<Atom, DecodeError> {
    let malformed = |source| DecodeError::MalformedEncoding { pos, source };
    if header == NIL_MARKER {
        return Ok(Atom::NIL);
    }
    if header <= MAX_SINGLE_BYTE {
        return Ok(Atom::from([header]));
    }

    let mut bit_count = 0;
    let mut bit_mask = 0x80u8;
    let mut first = header;
    while first & bit_mask != 0 {
        bit_count += 1;
        first &= !bit_mask;
        bit_mask >>= 1;
    }
    let mut size = u64::from(first);
    if bit_count > 1 {
        for byte in buf.take(bit_count - 1).map_err(malformed)? {
            size = (size << 8) | u64::from(*byte);
        }
    }
    if size >= MAX_ATOM_LEN {
        return Err(DecodeError::BlobTooLarge { pos, size });
    }
    let size = usize::try_from(size).map_err(|_| DecodeError::BlobTooLarge { pos, size })?;
    let bytes = buf.take(size).map_err(malformed)?;
    Ok(Atom::from_slice(bytes))
}

/// Reads exactly one value starting at the cursor
pub fn read_value(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let mut ops = vec![ReadOp::Read];
    let mut values = Vec::new();
    while let Some(op) = ops.pop() {
        match op {
            ReadOp::Read => {
                let pos = buf.pos();
                let header = buf
                    .u8()
                    .map_err(|source| DecodeError::MalformedEncoding { pos, source })?;
                if header == CONS_BOX_MARKER {
                    ops.extend([ReadOp::Cons, ReadOp::Read, ReadOp::Read]);
                } else {
                    values.push(Value::Atom(read_atom(buf, header, pos)?));
                }
            }
            ReadOp::Cons => {
                let (Some(rest), Some(first)) = (values.pop(), values.pop()) else {
                    unreachable!("a cons is always scheduled after its two reads")
                };
                values.push(Value::pair(first, rest));
            }
        }
    }
    let Some(value) = values.pop() else {
        unreachable!("the initial read always yields a value")
    };
    Ok(value)
}

/// Decodes one value from the front of `bytes`, returning it together with
/// the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
    let mut buf = ParseBuf::new(bytes);
    let value = read_value(&mut buf)?;
    Ok((value, buf.pos()))
}

/// Like [`decode`], but `bytes` must hold nothing else
pub fn decode_exact(bytes: &[u8]) -> Result<Value, DecodeError> {
    let mut buf = ParseBuf::new(bytes);
    let value = read_value(&mut buf)?;
    buf.ensure_empty()?;
    Ok(value)
}

pub fn decode_hex(text: &str) -> Result<Value, DecodeError> {
    decode_exact(&hex::decode(text.trim())?)
}

fn write_atom(bytes: &[u8], out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let len = bytes.len();
    match bytes {
        [] => {
            out.push(NIL_MARKER);
            return Ok(());
        }
        [byte] if *byte <= MAX_SINGLE_BYTE => {
            out.push(*byte);
            return Ok(());
        }
        _ => {}
    }
    let size = len as u64;
    if size < 0x40 {
        out.push(0x80 | size as u8);
    } else if size < 0x2000 {
        out.extend([0xC0 | (size >> 8) as u8, size as u8]);
    } else if size < 0x10_0000 {
        out.extend([0xE0 | (size >> 16) as u8, (size >> 8) as u8, size as u8]);
    } else if size < 0x800_0000 {
        out.extend([
            0xF0 | (size >> 24) as u8,
            (size >> 16) as u8,
            (size >> 8) as u8,
            size as u8,
        ]);
    } else if size < MAX_ATOM_LEN {
        out.extend([
            0xF8 | (size >> 32) as u8,
            (size >> 24) as u8,
            (size >> 16) as u8,
            (size >> 8) as u8,
            size as u8,
        ]);
    } else {
        return Err(EncodeError::AtomTooLarge { len });
    }
    out.extend_from_slice(bytes);
    Ok(())
}

/// Appends the canonical encoding of `value` to `out`
pub fn encode_to(value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Atom(atom) => write_atom(atom.as_bytes(), out)?,
            Value::Pair(pair) => {
                out.push(CONS_BOX_MARKER);
                pending.push(pair.rest());
                pending.push(pair.first());
            }
        }
    }
    Ok(())
}

pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode_to(value, &mut out)?;
    Ok(out)
}

/// A decoded value that remembers the exact bytes it was read from.
///
/// Hashes are taken over wire bytes, so a program decoded from a
/// non-canonical encoding must be written back verbatim rather than
/// re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedProgram {
    root: Value,
    bytes: Bytes,
}

impl SerializedProgram {
    pub fn from_parse_buf(buf: &mut ParseBuf<'_>) -> Result<Self, DecodeError> {
        let start = buf.pos();
        let root = read_value(buf)?;
        let bytes = Bytes::copy_from_slice(buf.consumed_since(start));
        trace!(len = bytes.len(), "read serialized program");
        Ok(Self { root, bytes })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = ParseBuf::new(bytes);
        let program = Self::from_parse_buf(&mut buf)?;
        buf.ensure_empty()?;
        Ok(program)
    }

    pub fn from_hex(text: &str) -> Result<Self, DecodeError> {
        Self::from_bytes(&hex::decode(text.trim())?)
    }

    /// Wraps a value built in memory using its canonical encoding
    pub fn from_value(root: Value) -> Result<Self, EncodeError> {
        let bytes = encode(&root)?.into();
        Ok(Self { root, bytes })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes the original bytes back out unchanged
    pub fn to_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::{check, let_assert};

    use super::*;

    fn hex_of(value: &Value) -> String {
        hex::encode(encode(value).unwrap())
    }

    #[test]
    fn atom_encodings() {
        check!(hex_of(&Value::NIL) == "80");
        check!(hex_of(&Value::atom([0x00])) == "00");
        check!(hex_of(&Value::atom([0x7F])) == "7f");
        check!(hex_of(&Value::atom([0x80])) == "8180");
        check!(hex_of(&Value::atom([0xFF])) == "81ff");
        check!(hex_of(&Value::atom(b"hello".to_vec())) == "8568656c6c6f");
    }

    #[test]
    fn length_header_boundaries() {
        for (len, header) in [
            (0x3F, "bf"),
            (0x40, "c040"),
            (0x1FFF, "dfff"),
            (0x2000, "e02000"),
            (0xF_FFFF, "efffff"),
            (0x10_0000, "f0100000"),
        ] {
            let encoded = encode(&Value::atom(vec![0x99; len])).unwrap();
            check!(hex::encode(&encoded[..header.len() / 2]) == header, "{len}");
            check!(encoded.len() == header.len() / 2 + len);
            let (decoded, used) = decode(&encoded).unwrap();
            check!(used == encoded.len());
            check!(decoded.as_atom().unwrap().len() == len);
        }
    }

    #[test]
    fn pair_encoding() {
        let list = Value::list([Value::atom([1]), Value::atom([2])]);
        check!(hex_of(&list) == "ff01ff0280");
        let dotted = Value::pair(Value::atom([1]), Value::atom([2]));
        check!(hex_of(&dotted) == "ff0102");
    }

    #[test]
    fn decode_reports_consumed_length() {
        let (value, used) = decode(&hex::decode("ff0102ffff").unwrap()).unwrap();
        check!(used == 3);
        check!(value == Value::pair(Value::atom([1]), Value::atom([2])));
    }

    #[test]
    fn truncated_input() {
        let_assert!(Err(DecodeError::MalformedEncoding { pos, source }) = decode(&[]));
        check!(pos == 0);
        check!(source == BufferTooShort { size: 0, pos: 0, left: 0, need: 1 });

        let_assert!(Err(DecodeError::MalformedEncoding { pos, source }) = decode(&[0x83, 0x01]));
        check!(pos == 0);
        check!(source.need == 3);
        check!(source.left == 1);

        let_assert!(Err(DecodeError::MalformedEncoding { pos, .. }) = decode(&[0xFF, 0x01]));
        check!(pos == 2);
    }

    #[test]
    fn oversized_header() {
        let_assert!(
            Err(DecodeError::BlobTooLarge { pos: 0, size }) =
                decode(&[0xFC, 0x04, 0x00, 0x00, 0x00, 0x00])
        );
        check!(size == MAX_ATOM_LEN);
    }

    #[test]
    fn trailing_bytes() {
        let_assert!(
            Err(DecodeError::TrailingBytes { size: 2, pos: 1 }) = decode_exact(&[0x01, 0x02])
        );
        check!(decode_hex(" ff0180\n").unwrap() == Value::list([Value::atom([1])]));
        let_assert!(Err(DecodeError::InvalidHex(_)) = decode_hex("zz"));
    }

    #[test]
    fn non_canonical_program_keeps_its_bytes() {
        let program = SerializedProgram::from_hex("8105").unwrap();
        check!(program.root() == &Value::atom([0x05]));
        let mut out = Vec::new();
        program.to_bytes(&mut out);
        check!(out == vec![0x81, 0x05]);
        check!(encode(program.root()).unwrap() == vec![0x05]);
    }

    #[test]
    fn programs_read_back_to_back() {
        let bytes = hex::decode("ff0102ff0380").unwrap();
        let mut buf = ParseBuf::new(&bytes);
        let first = SerializedProgram::from_parse_buf(&mut buf).unwrap();
        let second = SerializedProgram::from_parse_buf(&mut buf).unwrap();
        check!(first.as_bytes() == [0xFF, 0x01, 0x02]);
        check!(second.as_bytes() == [0xFF, 0x03, 0x80]);
        check!(buf.ensure_empty().is_ok());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut bytes = vec![CONS_BOX_MARKER; 500_000];
        bytes.extend(std::iter::repeat(NIL_MARKER).take(500_001));
        let (value, used) = decode(&bytes).unwrap();
        check!(used == bytes.len());
        check!(encode(&value).unwrap() == bytes);
    }

    #[test]
    fn canonical_encoding_decodes_to_same_value() {
        arbtest(|u| {
            let value: Value = u.arbitrary()?;
            let bytes = encode(&value).unwrap();
            let decoded = decode_exact(&bytes).unwrap();
            check!(decoded == value);
            check!(encode(&decoded).unwrap() == bytes);
            Ok(())
        });
    }
}

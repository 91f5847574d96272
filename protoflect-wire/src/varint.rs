//! Low-level byte cursor and varint primitives shared by the descriptor
//! parser and the message codec.

use crate::WireError;

/// Wire type: varint.
pub(crate) const WT_VARINT: u8 = 0;
/// Wire type: 64-bit fixed.
pub(crate) const WT_FIXED64: u8 = 1;
/// Wire type: length-delimited.
pub(crate) const WT_LEN: u8 = 2;
/// Wire type: 32-bit fixed.
pub(crate) const WT_FIXED32: u8 = 5;

/// Forward-only reader over a byte slice.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub(crate) fn read_varint(&mut self) -> Result<u64, WireError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *self.buf.get(self.pos).ok_or(WireError::UnexpectedEof)?;
            self.pos += 1;
            if shift >= 64 {
                return Err(WireError::InvalidTag);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Reads a field tag, returning `(field_number, wire_type)`.
    pub(crate) fn read_tag(&mut self) -> Result<(u32, u8), WireError> {
        let tag = self.read_varint()?;
        let field = (tag >> 3) as u32;
        if field == 0 {
            return Err(WireError::InvalidTag);
        }
        Ok((field, (tag & 0x7) as u8))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::UnexpectedEof)?;
        if end > self.buf.len() {
            return Err(WireError::UnexpectedEof);
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_len_delimited(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len)
    }

    pub(crate) fn read_fixed32(&mut self) -> Result<[u8; 4], WireError> {
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub(crate) fn read_fixed64(&mut self) -> Result<[u8; 8], WireError> {
        let b = self.read_bytes(8)?;
        Ok([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// Skips one value of the given wire type. Used for unknown fields.
    pub(crate) fn skip(&mut self, wire_type: u8) -> Result<(), WireError> {
        match wire_type {
            WT_VARINT => {
                self.read_varint()?;
            }
            WT_FIXED64 => {
                self.read_fixed64()?;
            }
            WT_LEN => {
                self.read_len_delimited()?;
            }
            WT_FIXED32 => {
                self.read_fixed32()?;
            }
            other => return Err(WireError::WireTypeMismatch { field: 0, found: other }),
        }
        Ok(())
    }
}

pub(crate) fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub(crate) fn put_tag(out: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(out, (u64::from(field) << 3) | u64::from(wire_type));
}

pub(crate) fn put_len_delimited(out: &mut Vec<u8>, payload: &[u8]) {
    put_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            put_varint(&mut buf, v);
            let mut r = ByteReader::new(&buf);
            assert_eq!(r.read_varint().unwrap(), v);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn tag_roundtrip() {
        let mut buf = Vec::new();
        put_tag(&mut buf, 150, WT_LEN);
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_tag().unwrap(), (150, WT_LEN));
    }

    #[test]
    fn truncated_varint_is_eof() {
        let mut r = ByteReader::new(&[0x80]);
        assert_eq!(r.read_varint(), Err(WireError::UnexpectedEof));
    }

    #[test]
    fn skip_all_wire_types() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 7);
        buf.extend_from_slice(&42u64.to_le_bytes());
        put_len_delimited(&mut buf, b"abc");
        buf.extend_from_slice(&1u32.to_le_bytes());
        let mut r = ByteReader::new(&buf);
        for wt in [WT_VARINT, WT_FIXED64, WT_LEN, WT_FIXED32] {
            r.skip(wt).unwrap();
        }
        assert!(r.is_empty());
    }
}

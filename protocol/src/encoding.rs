//! Primitive encodings: fixed-width integers, var-ints and var-strings.
//!
//! All multi-byte integers are little-endian except the port inside an
//! address record, which is big-endian. Callers pick the right reader;
//! nothing here guesses.

use crate::ProtocolError;

/// Cursor over an in-memory payload. Every read is bounds-checked.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::UnexpectedEnd {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16_be(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Compact unsigned integer: one byte below `0xFD`, otherwise a marker
    /// followed by a u16/u32/u64. Non-canonical (over-long) forms are rejected.
    pub fn read_var_int(&mut self) -> Result<u64, ProtocolError> {
        let prefix = self.read_u8()?;
        let (value, min) = match prefix {
            0xFD => (u64::from(self.read_u16_le()?), 0xFD),
            0xFE => (u64::from(self.read_u32_le()?), 0x1_0000),
            0xFF => (self.read_u64_le()?, 0x1_0000_0000),
            small => return Ok(u64::from(small)),
        };
        if value < min {
            return Err(ProtocolError::MalformedVarInt { prefix });
        }
        Ok(value)
    }

    /// Var-int length followed by that many raw bytes, capped at `max`.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<&'a [u8], ProtocolError> {
        let len = self.read_var_int()?;
        if len > max as u64 {
            return Err(ProtocolError::StringTooLong { len, max });
        }
        self.take(len as usize)
    }

    pub fn read_var_string(&mut self, max: usize) -> Result<String, ProtocolError> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Append a var-int in its shortest form.
pub fn put_var_int(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

pub fn put_var_string(out: &mut Vec<u8>, s: &str) {
    put_var_int(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(v: u64) -> Vec<u8> {
        let mut out = Vec::new();
        put_var_int(&mut out, v);
        out
    }

    #[test]
    fn var_int_widths_at_boundaries() {
        assert_eq!(encoded(0xFC), vec![0xFC]);
        assert_eq!(encoded(0xFD), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(encoded(0xFFFF), vec![0xFD, 0xFF, 0xFF]);
        assert_eq!(encoded(0x1_0000), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encoded(0x1_0000_0000).len(), 9);
        assert_eq!(encoded(0x1_0000_0000)[0], 0xFF);
    }

    #[test]
    fn var_int_reads_back_each_width() {
        for v in [0u64, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, 0x1_0000_0000, u64::MAX] {
            let bytes = encoded(v);
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.read_var_int().unwrap(), v);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn non_canonical_var_int_is_rejected() {
        let mut r = ByteReader::new(&[0xFD, 0x05, 0x00]);
        assert!(matches!(
            r.read_var_int(),
            Err(ProtocolError::MalformedVarInt { prefix: 0xFD })
        ));
    }

    #[test]
    fn truncated_var_int_is_rejected() {
        let mut r = ByteReader::new(&[0xFE, 0x01]);
        assert!(matches!(
            r.read_var_int(),
            Err(ProtocolError::UnexpectedEnd { needed: 4, remaining: 1 })
        ));
    }

    #[test]
    fn var_string_respects_cap() {
        let mut out = Vec::new();
        put_var_string(&mut out, "hello");
        assert_eq!(ByteReader::new(&out).read_var_string(16).unwrap(), "hello");
        assert!(matches!(
            ByteReader::new(&out).read_var_string(4),
            Err(ProtocolError::StringTooLong { len: 5, max: 4 })
        ));
    }

    #[test]
    fn big_endian_port_reader() {
        let mut r = ByteReader::new(&[0x28, 0x5D]);
        assert_eq!(r.read_u16_be().unwrap(), 10333);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut r = ByteReader::new(&[0x02, 0xC3, 0x28]);
        assert!(matches!(r.read_var_string(8), Err(ProtocolError::InvalidUtf8)));
    }
}

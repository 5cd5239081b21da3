//! Length-prefixed byte framing shared by the key encoder and the proof codec.
//!
//! Every variable field is `u32 big-endian length || raw bytes`, the SSH
//! `string` convention, so any host language can parse it unambiguously.

use crate::types::VaniError;

/// Append a length-prefixed field.
pub fn put_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

/// Cursor over a framed byte buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], VaniError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| VaniError::Serialization(format!("truncated {}", what)))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self, what: &str) -> Result<u8, VaniError> {
        Ok(self.take(1, what)?[0])
    }

    pub fn u32(&mut self, what: &str) -> Result<u32, VaniError> {
        let raw = self.take(4, what)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn bytes(&mut self, what: &str) -> Result<&'a [u8], VaniError> {
        let len = self.u32(what)? as usize;
        self.take(len, what)
    }

    /// Fail if anything is left after the last field.
    pub fn finish(self) -> Result<(), VaniError> {
        if self.pos != self.buf.len() {
            return Err(VaniError::Serialization(format!(
                "{} trailing bytes",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_layout() {
        let mut out = Vec::new();
        put_bytes(&mut out, b"abc");
        assert_eq!(out, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_reader_reads_fields_in_order() {
        let mut out = vec![1u8];
        put_bytes(&mut out, b"key");
        out.extend_from_slice(&42u32.to_be_bytes());

        let mut r = Reader::new(&out);
        assert_eq!(r.u8("version").unwrap(), 1);
        assert_eq!(r.bytes("key").unwrap(), b"key");
        assert_eq!(r.u32("index").unwrap(), 42);
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_reader_rejects_truncation() {
        // Declares 16 bytes, carries 2.
        let buf = [0u8, 0, 0, 16, 1, 2];
        let mut r = Reader::new(&buf);
        assert!(matches!(r.bytes("field"), Err(VaniError::Serialization(_))));
    }

    #[test]
    fn test_reader_rejects_huge_length() {
        let buf = [0xFFu8, 0xFF, 0xFF, 0xFF];
        let mut r = Reader::new(&buf);
        assert!(r.bytes("field").is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let buf = [7u8, 8];
        let mut r = Reader::new(&buf);
        r.u8("a").unwrap();
        assert!(r.finish().is_err());
    }
}

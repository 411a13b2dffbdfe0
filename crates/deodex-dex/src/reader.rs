use crate::error::{DexError, Result};

/// Bounds-checked little-endian cursor over the container bytes.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    pub(crate) fn at(bytes: &'a [u8], pos: usize) -> Result<Self> {
        if pos > bytes.len() {
            return Err(DexError::UnexpectedEof(pos));
        }
        Ok(Reader { bytes, pos })
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DexError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a ULEB128 value, at most five bytes as in the dex format.
    pub(crate) fn read_uleb128(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            let payload = u32::from(byte & 0x7f);
            if shift == 28 && payload > 0x0f {
                return Err(DexError::OversizedUleb(start));
            }
            value |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DexError::OversizedUleb(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_scalars() {
        let mut r = Reader::new(&[0x78, 0x56, 0x34, 0x12, 0xff]);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_u8().unwrap(), 0xff);
        assert!(matches!(r.read_u8(), Err(DexError::UnexpectedEof(5))));
    }

    #[test]
    fn uleb128_single_and_multi_byte() {
        let mut r = Reader::new(&[0x00, 0x7f, 0x80, 0x01, 0xb4, 0x07]);
        assert_eq!(r.read_uleb128().unwrap(), 0);
        assert_eq!(r.read_uleb128().unwrap(), 127);
        assert_eq!(r.read_uleb128().unwrap(), 128);
        assert_eq!(r.read_uleb128().unwrap(), 0x3b4);
    }

    #[test]
    fn uleb128_max_u32() {
        let mut r = Reader::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(r.read_uleb128().unwrap(), u32::MAX);
    }

    #[test]
    fn uleb128_rejects_oversized() {
        let mut r = Reader::new(&[0xff, 0xff, 0xff, 0xff, 0x1f]);
        assert!(matches!(r.read_uleb128(), Err(DexError::OversizedUleb(0))));
        let mut r = Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(matches!(r.read_uleb128(), Err(DexError::OversizedUleb(0))));
    }

    #[test]
    fn uleb128_truncated_reports_eof() {
        let mut r = Reader::new(&[0x80]);
        assert!(matches!(r.read_uleb128(), Err(DexError::UnexpectedEof(1))));
    }
}

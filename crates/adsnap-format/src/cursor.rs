use adsnap_core::error::FormatError;

use crate::codec;

/// Positional little-endian reader over the snapshot bytes. Reads past the
/// end fail with `FormatError::Truncated`; nothing is allocated except the
/// owned strings the string readers return.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, offset: u64) -> Result<(), FormatError> {
        let offset = usize::try_from(offset).map_err(|_| FormatError::InvalidRange {
            field: "cursor offset",
        })?;
        if offset > self.bytes.len() {
            return Err(FormatError::Truncated {
                at: offset as u64,
                needed: 0,
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(n).ok_or(FormatError::InvalidRange {
            field: "cursor length",
        })?;
        if end > self.bytes.len() {
            return Err(FormatError::Truncated {
                at: self.pos as u64,
                needed: n,
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let slice = self.read_bytes(N)?;
        Ok(slice.try_into().expect("slice length checked"))
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, FormatError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, FormatError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// NUL-terminated single-byte string.
    pub fn read_cstr(&mut self) -> Result<String, FormatError> {
        let start = self.pos;
        let rel = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(FormatError::Truncated {
                at: self.bytes.len() as u64,
                needed: 1,
            })?;
        let slice = &self.bytes[start..start + rel];
        self.pos = start + rel + 1;
        Ok(String::from_utf8_lossy(slice).into_owned())
    }

    /// Length-prefixed UTF-16LE string: a u32 character count followed by
    /// that many 16-bit code units, no terminator.
    pub fn read_ucstring(&mut self) -> Result<String, FormatError> {
        let chars = self.read_u32()? as usize;
        let byte_len = chars.checked_mul(2).ok_or(FormatError::InvalidRange {
            field: "string length",
        })?;
        let raw = self.read_bytes(byte_len)?;
        Ok(codec::decode_utf16le(raw))
    }
}

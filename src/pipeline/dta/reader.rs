//! Byte cursor over an in-memory `.dta` file.

use encoding_rs::WINDOWS_1252;

use super::error::DtaError;

/// Byte order declared in the `<byteorder>` header tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `LSF` - least significant byte first.
    Little,
    /// `MSF` - most significant byte first.
    Big,
}

/// Text encoding of string data.
///
/// Release 118 switched from Windows-1252 to UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Windows1252,
    Utf8,
}

/// Sequential reader with bounds checks that map to [`DtaError::UnexpectedEof`].
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            order: ByteOrder::Little,
        }
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes left after the current position.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn seek(&mut self, offset: u64) -> Result<(), DtaError> {
        let offset = offset as usize;
        if offset > self.buf.len() {
            return Err(DtaError::UnexpectedEof {
                offset: offset as u64,
                needed: 0,
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DtaError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(DtaError::UnexpectedEof {
                offset: self.pos as u64,
                needed: n,
            }),
        }
    }

    /// Consume `tag` or fail with [`DtaError::MissingTag`].
    pub fn expect_tag(&mut self, tag: &[u8]) -> Result<(), DtaError> {
        let offset = self.position();
        match self.read_bytes(tag.len()) {
            Ok(bytes) if bytes == tag => Ok(()),
            _ => Err(DtaError::MissingTag {
                tag: String::from_utf8_lossy(tag).into_owned(),
                offset,
            }),
        }
    }

    /// Return true (and consume) when the next bytes equal `tag`.
    pub fn peek_tag(&mut self, tag: &[u8]) -> bool {
        let end = self.pos + tag.len();
        if end <= self.buf.len() && &self.buf[self.pos..end] == tag {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DtaError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DtaError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DtaError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, DtaError> {
        let b = self.array::<2>()?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16, DtaError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, DtaError> {
        let b = self.array::<4>()?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, DtaError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, DtaError> {
        let b = self.array::<8>()?;
        Ok(match self.order {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        })
    }

    /// Read an unsigned integer of 1 to 8 bytes (used by packed strL references).
    pub fn read_uint(&mut self, width: usize) -> Result<u64, DtaError> {
        let bytes = self.read_bytes(width)?;
        let mut value = 0u64;
        match self.order {
            ByteOrder::Little => {
                for (i, &b) in bytes.iter().enumerate() {
                    value |= (b as u64) << (8 * i);
                }
            }
            ByteOrder::Big => {
                for &b in bytes {
                    value = (value << 8) | b as u64;
                }
            }
        }
        Ok(value)
    }

    /// Read a fixed-width, NUL-padded string field.
    pub fn read_fixed_string(
        &mut self,
        width: usize,
        encoding: TextEncoding,
    ) -> Result<String, DtaError> {
        let bytes = self.read_bytes(width)?;
        Ok(decode_text(bytes, encoding))
    }
}

/// Decode bytes up to the first NUL using the file's text encoding.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let bytes = &bytes[..end];
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Windows1252 => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

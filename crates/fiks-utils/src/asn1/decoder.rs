//! ASN.1 BER/DER decoder over an in-memory buffer.

use super::{tags, Tag, TagClass, Tlv, MAX_DEPTH};
use fiks_types::CryptoError;

/// A cursor-style decoder over a borrowed buffer.
///
/// Accepts definite lengths everywhere and indefinite lengths on
/// constructed elements, so BER produced by streaming encoders parses the
/// same way as DER.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder over the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    fn nested(&self, data: &'a [u8]) -> Result<Decoder<'a>, CryptoError> {
        if self.depth >= MAX_DEPTH {
            return Err(CryptoError::malformed("nesting too deep"));
        }
        Ok(Decoder {
            data,
            pos: 0,
            depth: self.depth + 1,
        })
    }

    /// Returns the remaining undecoded bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Parse the next TLV element.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, CryptoError> {
        let (tag, tag_len) = Tag::from_bytes(&self.data[self.pos..])?;
        self.pos += tag_len;

        match self.read_length()? {
            Some(length) => {
                let end = self
                    .pos
                    .checked_add(length)
                    .filter(|&end| end <= self.data.len())
                    .ok_or_else(|| CryptoError::malformed("length exceeds data"))?;
                let value = &self.data[self.pos..end];
                self.pos = end;
                Ok(Tlv { tag, value })
            }
            None => {
                if !tag.constructed {
                    return Err(CryptoError::malformed("indefinite length on primitive"));
                }
                let start = self.pos;
                let mut inner = self.nested(&self.data[start..])?;
                loop {
                    let before = inner.pos;
                    let child = inner.read_tlv()?;
                    if child.tag.is_end_of_contents() {
                        if !child.value.is_empty() {
                            return Err(CryptoError::malformed("non-empty end-of-contents"));
                        }
                        self.pos = start + inner.pos;
                        return Ok(Tlv {
                            tag,
                            value: &self.data[start..start + before],
                        });
                    }
                }
            }
        }
    }

    /// Parse a length; `None` is the BER indefinite form.
    fn read_length(&mut self) -> Result<Option<usize>, CryptoError> {
        let first = *self
            .data
            .get(self.pos)
            .ok_or_else(|| CryptoError::malformed("missing length"))?;
        self.pos += 1;

        if first < 0x80 {
            return Ok(Some(first as usize));
        }
        if first == 0x80 {
            return Ok(None);
        }
        let num_bytes = (first & 0x7F) as usize;
        if num_bytes > std::mem::size_of::<usize>() || self.pos + num_bytes > self.data.len() {
            return Err(CryptoError::malformed("bad length encoding"));
        }
        let length = self.data[self.pos..self.pos + num_bytes]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        self.pos += num_bytes;
        Ok(Some(length))
    }

    /// Read the next element and return its complete encoding
    /// (identifier, length and contents octets).
    pub fn read_raw(&mut self) -> Result<&'a [u8], CryptoError> {
        let start = self.pos;
        self.read_tlv()?;
        Ok(&self.data[start..self.pos])
    }

    /// Read an element that must carry the given identifier octet.
    pub fn read_expected(&mut self, tag_byte: u8) -> Result<&'a [u8], CryptoError> {
        let tlv = self.read_tlv()?;
        if tlv.tag != Tag::from_byte(tag_byte) {
            return Err(CryptoError::malformed(format!(
                "expected tag {tag_byte:#04x}, found {:?}",
                tlv.tag
            )));
        }
        Ok(tlv.value)
    }

    /// Read an INTEGER and return its bytes (big-endian, may include leading zero).
    pub fn read_integer(&mut self) -> Result<&'a [u8], CryptoError> {
        let value = self.read_expected(tags::INTEGER)?;
        if value.is_empty() {
            return Err(CryptoError::malformed("empty INTEGER"));
        }
        Ok(value)
    }

    /// Read a small non-negative INTEGER, such as a version number.
    pub fn read_small_uint(&mut self) -> Result<u32, CryptoError> {
        let value = self.read_integer()?;
        if value[0] & 0x80 != 0 || value.len() > 4 {
            return Err(CryptoError::malformed("INTEGER out of range"));
        }
        Ok(value.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }

    /// Read a primitive OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8], CryptoError> {
        self.read_expected(tags::OCTET_STRING)
    }

    /// Read a BIT STRING and return (unused_bits, data).
    pub fn read_bit_string(&mut self) -> Result<(u8, &'a [u8]), CryptoError> {
        let value = self.read_expected(tags::BIT_STRING)?;
        let (&unused, data) = value
            .split_first()
            .ok_or_else(|| CryptoError::malformed("empty BIT STRING"))?;
        Ok((unused, data))
    }

    /// Read an OID and return the raw bytes.
    pub fn read_oid(&mut self) -> Result<&'a [u8], CryptoError> {
        self.read_expected(tags::OID)
    }

    /// Read a BOOLEAN value.
    pub fn read_boolean(&mut self) -> Result<bool, CryptoError> {
        match self.read_expected(tags::BOOLEAN)? {
            [b] => Ok(*b != 0x00),
            _ => Err(CryptoError::malformed("bad BOOLEAN")),
        }
    }

    /// Read a SEQUENCE, returning a sub-decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder<'a>, CryptoError> {
        let value = self.read_expected(tags::SEQUENCE)?;
        self.nested(value)
    }

    /// Read a SET, returning a sub-decoder over its contents.
    pub fn read_set(&mut self) -> Result<Decoder<'a>, CryptoError> {
        let value = self.read_expected(tags::SET)?;
        self.nested(value)
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Result<Tag, CryptoError> {
        let (tag, _) = Tag::from_bytes(&self.data[self.pos..])?;
        Ok(tag)
    }

    /// Read a context-specific tagged value with the expected tag number.
    pub fn read_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
    ) -> Result<Tlv<'a>, CryptoError> {
        let tlv = self.read_tlv()?;
        if !tlv.tag.is_context(tag_num) || tlv.tag.constructed != constructed {
            return Err(CryptoError::malformed(format!(
                "expected [{tag_num}], found {:?}",
                tlv.tag
            )));
        }
        Ok(tlv)
    }

    /// Try to read a context-specific tagged value. Returns `None` if
    /// the next tag does not match, without consuming any bytes.
    pub fn try_read_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
    ) -> Result<Option<Tlv<'a>>, CryptoError> {
        if self.is_empty() {
            return Ok(None);
        }
        let tag = self.peek_tag()?;
        if tag.class == TagClass::ContextSpecific
            && tag.number == tag_num
            && tag.constructed == constructed
        {
            Ok(Some(self.read_tlv()?))
        } else {
            Ok(None)
        }
    }

    /// Open a sub-decoder over an explicitly tagged `[n]` element.
    pub fn read_explicit(&mut self, tag_num: u32) -> Result<Decoder<'a>, CryptoError> {
        let tlv = self.read_context_specific(tag_num, true)?;
        self.nested(tlv.value)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), CryptoError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CryptoError::malformed("trailing data"))
        }
    }
}

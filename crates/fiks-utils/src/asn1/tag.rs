//! ASN.1 tag parsing and encoding.

use super::{Tag, TagClass};
use fiks_types::CryptoError;

impl Tag {
    /// Build a tag from a single identifier octet (tag numbers below 31).
    pub fn from_byte(byte: u8) -> Self {
        Tag {
            class: class_of(byte),
            constructed: byte & 0x20 != 0,
            number: (byte & 0x1F) as u32,
        }
    }

    /// Parse a tag from the first bytes of `input`.
    /// Returns the tag and number of bytes consumed.
    pub fn from_bytes(input: &[u8]) -> Result<(Self, usize), CryptoError> {
        let first = *input
            .first()
            .ok_or_else(|| CryptoError::malformed("missing tag"))?;
        if first & 0x1F != 0x1F {
            return Ok((Tag::from_byte(first), 1));
        }

        // High tag number form, base-128 continuation octets
        let mut number: u32 = 0;
        for (i, &byte) in input.iter().enumerate().skip(1) {
            number = number
                .checked_shl(7)
                .filter(|n| n >> 7 == number)
                .ok_or_else(|| CryptoError::malformed("tag number overflow"))?
                | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                let tag = Tag {
                    class: class_of(first),
                    constructed: first & 0x20 != 0,
                    number,
                };
                return Ok((tag, i + 1));
            }
        }
        Err(CryptoError::malformed("truncated tag"))
    }

    /// The single identifier octet for this tag, if it has a low tag number.
    pub fn to_byte(&self) -> Option<u8> {
        if self.number >= 0x1F {
            return None;
        }
        let class_bits = match self.class {
            TagClass::Universal => 0x00,
            TagClass::Application => 0x40,
            TagClass::ContextSpecific => 0x80,
            TagClass::Private => 0xC0,
        };
        let constructed_bit = if self.constructed { 0x20 } else { 0x00 };
        Some(class_bits | constructed_bit | self.number as u8)
    }

    /// True for the universal tag 0 used by end-of-contents markers.
    pub fn is_end_of_contents(&self) -> bool {
        self.class == TagClass::Universal && !self.constructed && self.number == 0
    }

    /// True if this is a context-specific tag with the given number.
    pub fn is_context(&self, number: u32) -> bool {
        self.class == TagClass::ContextSpecific && self.number == number
    }
}

fn class_of(byte: u8) -> TagClass {
    match byte >> 6 {
        0 => TagClass::Universal,
        1 => TagClass::Application,
        2 => TagClass::ContextSpecific,
        _ => TagClass::Private,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence_tag() {
        let (tag, len) = Tag::from_bytes(&[0x30]).unwrap();
        assert_eq!(tag.class, TagClass::Universal);
        assert!(tag.constructed);
        assert_eq!(tag.number, 0x10);
        assert_eq!(len, 1);
        assert_eq!(tag.to_byte(), Some(0x30));
    }

    #[test]
    fn test_parse_context_tags() {
        let (tag, _) = Tag::from_bytes(&[0xA0]).unwrap();
        assert!(tag.is_context(0));
        assert!(tag.constructed);

        let (tag, _) = Tag::from_bytes(&[0x80]).unwrap();
        assert!(tag.is_context(0));
        assert!(!tag.constructed);
    }

    #[test]
    fn test_high_tag_number() {
        let (tag, len) = Tag::from_bytes(&[0x9F, 0x81, 0x00]).unwrap();
        assert_eq!(tag.class, TagClass::ContextSpecific);
        assert_eq!(tag.number, 128);
        assert_eq!(len, 3);
        assert_eq!(tag.to_byte(), None);
    }

    #[test]
    fn test_truncated_high_tag() {
        assert!(Tag::from_bytes(&[0x1F, 0x81]).is_err());
        assert!(Tag::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_end_of_contents() {
        assert!(Tag::from_byte(0x00).is_end_of_contents());
        assert!(!Tag::from_byte(0x20).is_end_of_contents());
    }
}

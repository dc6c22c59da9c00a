//! ASN.1 DER encoder.

use super::tags;

/// End-of-contents octets closing an indefinite-length element.
pub const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

/// Encode an identifier octet plus length octets. `None` produces the BER
/// indefinite form, which must later be closed with [`END_OF_CONTENTS`].
pub fn encode_header(tag: u8, length: Option<usize>) -> Vec<u8> {
    let mut out = vec![tag];
    match length {
        Some(len) => push_length(&mut out, len),
        None => out.push(0x80),
    }
    out
}

fn push_length(out: &mut Vec<u8>, length: usize) {
    if length < 0x80 {
        out.push(length as u8);
        return;
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// A builder for constructing DER-encoded ASN.1 data.
#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume the encoder and return the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Write a raw TLV with the given tag byte and value.
    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.push(tag);
        push_length(&mut self.buf, value.len());
        self.buf.extend_from_slice(value);
        self
    }

    /// Write an INTEGER from unsigned big-endian magnitude bytes.
    pub fn write_integer(&mut self, value: &[u8]) -> &mut Self {
        // Minimal encoding: strip redundant leading zeros, then re-add one
        // if the high bit would make the value negative.
        let skip = value
            .iter()
            .take_while(|&&b| b == 0)
            .count()
            .min(value.len().saturating_sub(1));
        let trimmed = &value[skip..];
        if trimmed.is_empty() {
            return self.write_tlv(tags::INTEGER, &[0x00]);
        }
        if trimmed[0] & 0x80 != 0 {
            let mut padded = vec![0x00];
            padded.extend_from_slice(trimmed);
            self.write_tlv(tags::INTEGER, &padded)
        } else {
            self.write_tlv(tags::INTEGER, trimmed)
        }
    }

    /// Write an OCTET STRING.
    pub fn write_octet_string(&mut self, value: &[u8]) -> &mut Self {
        self.write_tlv(tags::OCTET_STRING, value)
    }

    /// Write an OID from raw encoded bytes.
    pub fn write_oid(&mut self, oid_bytes: &[u8]) -> &mut Self {
        self.write_tlv(tags::OID, oid_bytes)
    }

    /// Write a NULL.
    pub fn write_null(&mut self) -> &mut Self {
        self.write_tlv(tags::NULL, &[])
    }

    /// Write a SEQUENCE wrapping the given contents.
    pub fn write_sequence(&mut self, contents: &[u8]) -> &mut Self {
        self.write_tlv(tags::SEQUENCE, contents)
    }

    /// Write a SET wrapping the given contents.
    pub fn write_set(&mut self, contents: &[u8]) -> &mut Self {
        self.write_tlv(tags::SET, contents)
    }

    /// Write raw bytes directly (already DER-encoded).
    pub fn write_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Write a context-specific tagged value.
    pub fn write_context_specific(
        &mut self,
        tag_num: u8,
        constructed: bool,
        content: &[u8],
    ) -> &mut Self {
        let tag = tags::CONTEXT_SPECIFIC
            | (if constructed { tags::CONSTRUCTED } else { 0 })
            | (tag_num & 0x1F);
        self.write_tlv(tag, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::Decoder;

    #[test]
    fn test_length_forms() {
        assert_eq!(encode_header(0x04, Some(0x7F)), vec![0x04, 0x7F]);
        assert_eq!(encode_header(0x04, Some(0x80)), vec![0x04, 0x81, 0x80]);
        assert_eq!(encode_header(0x04, Some(0x100)), vec![0x04, 0x82, 0x01, 0x00]);
        assert_eq!(
            encode_header(0x04, Some(10 * 1024 * 1024)),
            vec![0x04, 0x83, 0xA0, 0x00, 0x00]
        );
        assert_eq!(encode_header(0x30, None), vec![0x30, 0x80]);
    }

    #[test]
    fn test_write_integer_minimal() {
        let mut enc = Encoder::new();
        enc.write_integer(&[0x00, 0x00, 0x05]);
        enc.write_integer(&[0xC0, 0xFF, 0xEE]);
        enc.write_integer(&[]);
        assert_eq!(
            enc.finish(),
            vec![0x02, 0x01, 0x05, 0x02, 0x04, 0x00, 0xC0, 0xFF, 0xEE, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_write_context_specific() {
        let mut inner = Encoder::new();
        inner.write_integer(&[0x02]);
        let inner_der = inner.finish();
        let mut enc = Encoder::new();
        enc.write_context_specific(0, true, &inner_der);
        assert_eq!(enc.finish(), &[0xA0, 3, 0x02, 1, 0x02]);
    }

    #[test]
    fn test_long_octet_string_decodes() {
        let payload = vec![0x5Au8; 300];
        let mut enc = Encoder::new();
        enc.write_octet_string(&payload);
        let der = enc.finish();
        assert_eq!(&der[..4], &[0x04, 0x82, 0x01, 0x2C]);
        let mut dec = Decoder::new(&der);
        assert_eq!(dec.read_octet_string().unwrap(), payload.as_slice());
    }
}

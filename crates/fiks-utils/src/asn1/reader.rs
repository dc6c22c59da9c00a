//! Incremental BER reader over a byte stream.
//!
//! Only element headers and explicitly requested small elements are held in
//! memory; large primitive contents are pulled through [`BerReader::read_content`].

use std::io::{self, Read};

use super::{Tag, MAX_DEPTH};
use fiks_types::CryptoError;

/// Length octets of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    Indefinite,
}

/// A decoded identifier + length, with its raw encoding.
#[derive(Debug, Clone)]
pub struct Header {
    pub tag: Tag,
    pub length: Length,
    raw: Vec<u8>,
}

impl Header {
    /// Identifier and length octets exactly as read.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_end_of_contents(&self) -> bool {
        self.tag.is_end_of_contents() && self.length == Length::Definite(0)
    }
}

/// An open constructed element; `end` is `None` for indefinite lengths.
#[derive(Debug, Clone, Copy)]
struct Frame {
    end: Option<u64>,
}

/// Streaming BER reader.
pub struct BerReader<R> {
    inner: R,
    pos: u64,
    peeked: Option<Header>,
    frames: Vec<Frame>,
}

impl<R: Read> BerReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            peeked: None,
            frames: Vec::new(),
        }
    }

    /// Offset of the next unconsumed element.
    pub fn position(&self) -> u64 {
        self.pos - self.peeked.as_ref().map_or(0, |h| h.raw.len() as u64)
    }

    /// Number of constructed elements currently open.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn read_byte(&mut self) -> Result<u8, CryptoError> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte)?;
        self.pos += 1;
        Ok(byte[0])
    }

    fn fetch_header(&mut self) -> Result<Header, CryptoError> {
        let first = self.read_byte()?;
        let mut raw = vec![first];
        if first & 0x1F == 0x1F {
            loop {
                let byte = self.read_byte()?;
                raw.push(byte);
                if byte & 0x80 == 0 {
                    break;
                }
                if raw.len() > 6 {
                    return Err(CryptoError::malformed("tag number too long"));
                }
            }
        }
        let (tag, _) = Tag::from_bytes(&raw)?;

        let len_byte = self.read_byte()?;
        raw.push(len_byte);
        let length = if len_byte < 0x80 {
            Length::Definite(len_byte as usize)
        } else if len_byte == 0x80 {
            if !tag.constructed {
                return Err(CryptoError::malformed("indefinite length on primitive"));
            }
            Length::Indefinite
        } else {
            let num_bytes = (len_byte & 0x7F) as usize;
            if num_bytes > std::mem::size_of::<usize>() {
                return Err(CryptoError::malformed("length too large"));
            }
            let mut length = 0usize;
            for _ in 0..num_bytes {
                let byte = self.read_byte()?;
                raw.push(byte);
                length = (length << 8) | byte as usize;
            }
            Length::Definite(length)
        };

        let header = Header { tag, length, raw };
        if let (Some(Frame { end: Some(end) }), Length::Definite(len)) =
            (self.frames.last(), header.length)
        {
            if self.pos.saturating_add(len as u64) > *end {
                return Err(CryptoError::malformed("element overruns its parent"));
            }
        }
        Ok(header)
    }

    /// Look at the next header without consuming it.
    pub fn peek_header(&mut self) -> Result<&Header, CryptoError> {
        if self.peeked.is_none() {
            let header = self.fetch_header()?;
            self.peeked = Some(header);
        }
        self.peeked
            .as_ref()
            .ok_or_else(|| CryptoError::malformed("missing header"))
    }

    /// Consume the next header.
    pub fn read_header(&mut self) -> Result<Header, CryptoError> {
        match self.peeked.take() {
            Some(header) => Ok(header),
            None => self.fetch_header(),
        }
    }

    /// True once the innermost open element has no more children.
    pub fn at_end(&mut self) -> Result<bool, CryptoError> {
        match self.frames.last().copied() {
            Some(Frame { end: Some(end) }) => Ok(self.position() >= end),
            Some(Frame { end: None }) => Ok(self.peek_header()?.is_end_of_contents()),
            None => Ok(false),
        }
    }

    /// Enter a constructed element whose identifier octet must be `tag_byte`.
    pub fn open(&mut self, tag_byte: u8) -> Result<(), CryptoError> {
        let header = self.read_header()?;
        if header.tag != Tag::from_byte(tag_byte) || !header.tag.constructed {
            return Err(CryptoError::malformed(format!(
                "expected constructed tag {tag_byte:#04x}, found {:?}",
                header.tag
            )));
        }
        self.push_frame(&header)
    }

    /// Enter a constructed element whose header was already consumed.
    pub fn enter(&mut self, header: &Header) -> Result<(), CryptoError> {
        if !header.tag.constructed {
            return Err(CryptoError::malformed("cannot enter a primitive element"));
        }
        self.push_frame(header)
    }

    fn push_frame(&mut self, header: &Header) -> Result<(), CryptoError> {
        if self.frames.len() >= MAX_DEPTH {
            return Err(CryptoError::malformed("nesting too deep"));
        }
        let end = match header.length {
            Length::Definite(len) => Some(
                self.pos
                    .checked_add(len as u64)
                    .ok_or_else(|| CryptoError::malformed("length overflow"))?,
            ),
            Length::Indefinite => None,
        };
        self.frames.push(Frame { end });
        Ok(())
    }

    /// Leave the innermost element, skipping any children not yet read and
    /// consuming its end-of-contents marker when indefinite.
    pub fn close(&mut self) -> Result<(), CryptoError> {
        while !self.at_end()? {
            self.skip_element()?;
        }
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| CryptoError::malformed("close without open"))?;
        match frame.end {
            Some(end) if self.position() != end => {
                Err(CryptoError::malformed("element length mismatch"))
            }
            Some(_) => Ok(()),
            None => {
                self.read_header()?;
                Ok(())
            }
        }
    }

    /// Read one complete element (header included) into memory. Elements
    /// larger than `limit` bytes are rejected.
    pub fn read_element(&mut self, limit: usize) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::new();
        self.read_element_into(&mut out, limit, 0)?;
        Ok(out)
    }

    fn read_element_into(
        &mut self,
        out: &mut Vec<u8>,
        limit: usize,
        depth: usize,
    ) -> Result<(), CryptoError> {
        if depth > MAX_DEPTH {
            return Err(CryptoError::malformed("nesting too deep"));
        }
        let header = self.read_header()?;
        out.extend_from_slice(&header.raw);
        match header.length {
            Length::Definite(len) => {
                if out.len().saturating_add(len) > limit {
                    return Err(CryptoError::malformed("element too large"));
                }
                let start = out.len();
                out.resize(start + len, 0);
                self.read_content(&mut out[start..])?;
            }
            Length::Indefinite => loop {
                if self.peek_header()?.is_end_of_contents() {
                    let eoc = self.read_header()?;
                    out.extend_from_slice(&eoc.raw);
                    break;
                }
                self.read_element_into(out, limit, depth + 1)?;
                if out.len() > limit {
                    return Err(CryptoError::malformed("element too large"));
                }
            },
        }
        Ok(())
    }

    /// Skip one complete element without buffering its contents.
    pub fn skip_element(&mut self) -> Result<(), CryptoError> {
        let header = self.read_header()?;
        match header.length {
            Length::Definite(len) => {
                let copied = io::copy(&mut (&mut self.inner).take(len as u64), &mut io::sink())?;
                self.pos += copied;
                if copied != len as u64 {
                    return Err(CryptoError::malformed("truncated input"));
                }
                Ok(())
            }
            Length::Indefinite => {
                self.push_frame(&header)?;
                self.close()
            }
        }
    }

    /// Fill `buf` from the contents of the current primitive element.
    pub fn read_content(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        if self.peeked.is_some() {
            return Err(CryptoError::malformed("content read after peek"));
        }
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Read up to `buf.len()` content bytes; returns the count (0 at EOF).
    pub fn read_content_partial(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
        if self.peeked.is_some() {
            return Err(CryptoError::malformed("content read after peek"));
        }
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Require that the underlying stream is exhausted.
    pub fn expect_eof(&mut self) -> Result<(), CryptoError> {
        if self.peeked.is_some() {
            return Err(CryptoError::malformed("trailing data"));
        }
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte)? {
            0 => Ok(()),
            _ => Err(CryptoError::malformed("trailing data")),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::{tags, Decoder};

    #[test]
    fn test_definite_structure() {
        // SEQUENCE { INTEGER 1, OCTET STRING 'abc' }
        let data = [0x30, 0x08, 0x02, 0x01, 0x01, 0x04, 0x03, b'a', b'b', b'c'];
        let mut rd = BerReader::new(&data[..]);
        rd.open(tags::SEQUENCE).unwrap();
        let int = rd.read_element(64).unwrap();
        assert_eq!(int, vec![0x02, 0x01, 0x01]);
        let header = rd.read_header().unwrap();
        assert_eq!(header.length, Length::Definite(3));
        let mut buf = [0u8; 3];
        rd.read_content(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        assert!(rd.at_end().unwrap());
        rd.close().unwrap();
        rd.expect_eof().unwrap();
    }

    #[test]
    fn test_indefinite_structure_with_skip() {
        // SEQUENCE(indef) { INTEGER 1, [1] { NULL }, EOC }
        let data = [
            0x30, 0x80, 0x02, 0x01, 0x01, 0xA1, 0x02, 0x05, 0x00, 0x00, 0x00,
        ];
        let mut rd = BerReader::new(&data[..]);
        rd.open(tags::SEQUENCE).unwrap();
        rd.read_element(64).unwrap();
        assert!(!rd.at_end().unwrap());
        // [1] is left unread; close skips it
        rd.close().unwrap();
        assert_eq!(rd.depth(), 0);
        rd.expect_eof().unwrap();
    }

    #[test]
    fn test_read_element_keeps_indefinite_encoding() {
        let data = [0x31, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00];
        let mut rd = BerReader::new(&data[..]);
        let raw = rd.read_element(64).unwrap();
        assert_eq!(raw, data.to_vec());
        let mut dec = Decoder::new(&raw);
        let mut set = dec.read_set().unwrap();
        assert_eq!(set.read_small_uint().unwrap(), 5);
    }

    #[test]
    fn test_element_limit() {
        let data = [0x04, 0x05, 1, 2, 3, 4, 5];
        let mut rd = BerReader::new(&data[..]);
        assert!(rd.read_element(4).is_err());
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let data = [0x30, 0x08, 0x02, 0x01];
        let mut rd = BerReader::new(&data[..]);
        rd.open(tags::SEQUENCE).unwrap();
        assert!(matches!(
            rd.read_element(64),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_child_overrunning_parent() {
        // SEQUENCE of length 3 containing an OCTET STRING claiming 5 bytes
        let data = [0x30, 0x03, 0x04, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut rd = BerReader::new(&data[..]);
        rd.open(tags::SEQUENCE).unwrap();
        assert!(rd.read_header().is_err());
    }

    #[test]
    fn test_huge_length_is_malformed() {
        // SEQUENCE with an eight-octet length of all ones, at the top level
        let mut data = vec![0x30, 0x88];
        data.extend_from_slice(&[0xFF; 8]);
        let mut rd = BerReader::new(&data[..]);
        assert!(matches!(
            rd.open(tags::SEQUENCE),
            Err(CryptoError::MalformedEnvelope(_))
        ));

        // same, one byte into the stream under an indefinite parent
        let mut data = vec![0x30, 0x80, 0xA0, 0x88];
        data.extend_from_slice(&[0xFF; 8]);
        let mut rd = BerReader::new(&data[..]);
        rd.open(tags::SEQUENCE).unwrap();
        assert!(matches!(
            rd.open(0xA0),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_open_rejects_wrong_tag() {
        let data = [0x31, 0x00];
        let mut rd = BerReader::new(&data[..]);
        assert!(rd.open(tags::SEQUENCE).is_err());
    }

    #[test]
    fn test_trailing_data_detected() {
        let data = [0x05, 0x00, 0xFF];
        let mut rd = BerReader::new(&data[..]);
        rd.read_element(8).unwrap();
        assert!(rd.expect_eof().is_err());
    }
}

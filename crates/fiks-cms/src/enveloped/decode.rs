//! Streaming EnvelopedData decoder.

use std::io::{self, Read};

use fiks_types::CryptoError;
use fiks_utils::asn1::{tags, BerReader, Decoder, Length};
use fiks_utils::oid::{self, known};

use super::{
    parse_content_cipher, parse_recipient_infos, AlgorithmIdentifier, EnvelopeHeader,
    MAX_HEADER_ELEMENT,
};

const CONTEXT_0: u8 = tags::CONTEXT_SPECIFIC | tags::CONSTRUCTED;

/// Frames still open once the encrypted content has been consumed:
/// ContentInfo, `[0]`, EnvelopedData, EncryptedContentInfo.
const OUTER_FRAMES: usize = 4;

fn read_small<R: Read>(rd: &mut BerReader<R>) -> Result<Vec<u8>, CryptoError> {
    rd.read_element(MAX_HEADER_ELEMENT)
}

/// Parses an envelope header from a byte stream.
///
/// Accepts DER and BER (indefinite lengths, constructed content).
pub struct EnvelopeDecoder<R: Read> {
    reader: BerReader<R>,
    header: EnvelopeHeader,
}

impl<R: Read> EnvelopeDecoder<R> {
    /// Read up to the start of the encrypted content.
    pub fn new(source: R) -> Result<Self, CryptoError> {
        let mut rd = BerReader::new(source);

        // ContentInfo
        rd.open(tags::SEQUENCE)?;
        let content_type = read_small(&mut rd)?;
        let content_type = Decoder::new(&content_type).read_oid()?.to_vec();
        if !known::pkcs7_enveloped_data().matches(&content_type) {
            return Err(CryptoError::malformed(format!(
                "content type {} is not enveloped-data",
                oid::describe(&content_type)
            )));
        }
        rd.open(CONTEXT_0)?;

        // EnvelopedData
        rd.open(tags::SEQUENCE)?;
        let version = Decoder::new(&read_small(&mut rd)?).read_small_uint()?;
        if !matches!(version, 0 | 2 | 3 | 4) {
            return Err(CryptoError::malformed(format!(
                "unsupported EnvelopedData version {version}"
            )));
        }
        // originatorInfo [0] IMPLICIT OPTIONAL
        if rd.peek_header()?.tag.is_context(0) {
            rd.skip_element()?;
        }
        let recipient_infos = parse_recipient_infos(&read_small(&mut rd)?)?;

        // EncryptedContentInfo
        rd.open(tags::SEQUENCE)?;
        let inner_type = Decoder::new(&read_small(&mut rd)?).read_oid()?.to_vec();
        let alg_der = read_small(&mut rd)?;
        let mut alg_dec = Decoder::new(&alg_der);
        let content_encryption_algorithm = AlgorithmIdentifier::parse(&mut alg_dec)?;
        alg_dec.finish()?;
        let (cipher, iv) = parse_content_cipher(&content_encryption_algorithm)?;

        let content_present = !rd.at_end()?;
        if content_present && !rd.peek_header()?.tag.is_context(0) {
            return Err(CryptoError::malformed("encryptedContent is not [0]"));
        }

        tracing::debug!(
            version,
            recipients = recipient_infos.len(),
            cipher = ?cipher,
            content_present,
            "parsed envelope header"
        );

        Ok(Self {
            reader: rd,
            header: EnvelopeHeader {
                version,
                recipient_infos,
                content_type: inner_type,
                content_encryption_algorithm,
                cipher,
                iv,
                content_present,
            },
        })
    }

    pub fn header(&self) -> &EnvelopeHeader {
        &self.header
    }

    /// Stream the inline encrypted content.
    pub fn into_content(self) -> Result<EncryptedContentReader<R>, CryptoError> {
        if !self.header.content_present {
            return Err(CryptoError::malformed("envelope carries no encrypted content"));
        }
        let mut reader = self.reader;
        let header = reader.read_header()?;
        let state = if header.tag.constructed {
            reader.enter(&header)?;
            ContentState::Segments { remaining: 0 }
        } else {
            match header.length {
                Length::Definite(len) => ContentState::Primitive {
                    remaining: len as u64,
                },
                Length::Indefinite => {
                    return Err(CryptoError::malformed("indefinite primitive content"))
                }
            }
        };
        Ok(EncryptedContentReader {
            reader,
            state,
            ciphertext_len: 0,
        })
    }

    /// Validate the rest of a detached-content envelope and return the source.
    pub fn finish(mut self) -> Result<R, CryptoError> {
        if self.header.content_present {
            return Err(CryptoError::malformed("envelope carries inline content"));
        }
        close_outer(&mut self.reader)?;
        Ok(self.reader.into_inner())
    }
}

fn close_outer<R: Read>(rd: &mut BerReader<R>) -> Result<(), CryptoError> {
    // Closing EnvelopedData also skips unprotectedAttrs [1].
    for _ in 0..OUTER_FRAMES {
        rd.close()?;
    }
    rd.expect_eof()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentState {
    /// Inside a primitive `[0]`.
    Primitive { remaining: u64 },
    /// Inside a constructed `[0]`, within the current OCTET STRING segment.
    Segments { remaining: u64 },
    Done,
}

/// Reader over the raw ciphertext of an envelope.
///
/// The end of the content is reported only after the remainder of the
/// envelope has been validated, so a truncated or trailing-garbage envelope
/// surfaces as an error rather than as a clean end of stream.
pub struct EncryptedContentReader<R: Read> {
    reader: BerReader<R>,
    state: ContentState,
    ciphertext_len: u64,
}

impl<R: Read> EncryptedContentReader<R> {
    /// Ciphertext bytes returned so far.
    pub fn ciphertext_len(&self) -> u64 {
        self.ciphertext_len
    }

    fn read_span(&mut self, buf: &mut [u8], remaining: u64) -> Result<usize, CryptoError> {
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.reader.read_content_partial(&mut buf[..want])?;
        if n == 0 {
            return Err(CryptoError::malformed("truncated encrypted content"));
        }
        self.ciphertext_len += n as u64;
        Ok(n)
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                ContentState::Done => return Ok(0),
                ContentState::Primitive { remaining: 0 } => {
                    close_outer(&mut self.reader)?;
                    self.state = ContentState::Done;
                }
                ContentState::Primitive { remaining } => {
                    let n = self.read_span(buf, remaining)?;
                    self.state = ContentState::Primitive {
                        remaining: remaining - n as u64,
                    };
                    return Ok(n);
                }
                ContentState::Segments { remaining: 0 } => {
                    if self.reader.at_end()? {
                        // the constructed [0] itself, then the outer levels
                        self.reader.close()?;
                        close_outer(&mut self.reader)?;
                        self.state = ContentState::Done;
                        continue;
                    }
                    let header = self.reader.read_header()?;
                    if header.tag.to_byte() != Some(tags::OCTET_STRING) {
                        return Err(CryptoError::malformed(format!(
                            "unexpected {:?} in encrypted content",
                            header.tag
                        )));
                    }
                    let Length::Definite(len) = header.length else {
                        return Err(CryptoError::malformed("indefinite content segment"));
                    };
                    self.state = ContentState::Segments {
                        remaining: len as u64,
                    };
                }
                ContentState::Segments { remaining } => {
                    let n = self.read_span(buf, remaining)?;
                    self.state = ContentState::Segments {
                        remaining: remaining - n as u64,
                    };
                    return Ok(n);
                }
            }
        }
    }
}

impl<R: Read> Read for EncryptedContentReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_inner(buf)?)
    }
}

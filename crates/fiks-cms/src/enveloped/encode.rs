//! Streaming EnvelopedData encoder.

use std::io::{self, Read, Write};

use fiks_crypto::{CbcEncryptor, ContentKey};
use fiks_types::CryptoError;
use fiks_utils::asn1::{encode_header, tags, Encoder, END_OF_CONTENTS};
use fiks_utils::oid::known;

use super::{
    content_cipher_identifier, enc_oid, envelope_version, EnvelopeOptions, KeyTransRecipientInfo,
};

/// `[0]` constructed, context-specific.
const CONTEXT_0: u8 = tags::CONTEXT_SPECIFIC | tags::CONSTRUCTED;

/// Indefinite-length levels left open by the header: ContentInfo, `[0]`,
/// EnvelopedData, EncryptedContentInfo and the encrypted content `[0]`.
const OPEN_LEVELS: usize = 5;

/// Everything preceding the first encrypted content segment.
fn encode_prefix(recipients: &[KeyTransRecipientInfo], content_key: &ContentKey) -> Vec<u8> {
    let mut out = encode_header(tags::SEQUENCE, None);
    out.extend_from_slice(&enc_oid(&known::pkcs7_enveloped_data()));
    out.extend_from_slice(&encode_header(CONTEXT_0, None));

    // EnvelopedData
    out.extend_from_slice(&encode_header(tags::SEQUENCE, None));
    let mut fixed = Encoder::new();
    fixed.write_integer(&envelope_version(recipients).to_be_bytes());
    let ri: Vec<u8> = recipients.iter().flat_map(|r| r.encode()).collect();
    fixed.write_set(&ri);
    out.extend_from_slice(&fixed.finish());

    // EncryptedContentInfo
    out.extend_from_slice(&encode_header(tags::SEQUENCE, None));
    out.extend_from_slice(&enc_oid(&known::pkcs7_data()));
    out.extend_from_slice(&content_cipher_identifier(content_key).encode());
    out.extend_from_slice(&encode_header(CONTEXT_0, None));
    out
}

/// Cuts the ciphertext stream into fixed-size OCTET STRING segments.
struct ChunkWriter<W: Write> {
    inner: W,
    chunk_size: usize,
    buf: Vec<u8>,
    written: u64,
}

impl<W: Write> ChunkWriter<W> {
    fn new(inner: W, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size,
            buf: Vec::with_capacity(chunk_size),
            written: 0,
        }
    }

    fn emit(inner: &mut W, segment: &[u8]) -> io::Result<()> {
        inner.write_all(&encode_header(tags::OCTET_STRING, Some(segment.len())))?;
        inner.write_all(segment)
    }

    /// Write the final short segment and close every open level.
    fn finish(mut self) -> Result<(W, u64), CryptoError> {
        if !self.buf.is_empty() {
            Self::emit(&mut self.inner, &self.buf)?;
            self.written += self.buf.len() as u64;
        }
        for _ in 0..OPEN_LEVELS {
            self.inner.write_all(&END_OF_CONTENTS)?;
        }
        self.inner.flush()?;
        Ok((self.inner, self.written))
    }
}

impl<W: Write> Write for ChunkWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut rest = data;
        while !rest.is_empty() {
            if self.buf.is_empty() && rest.len() >= self.chunk_size {
                let (segment, tail) = rest.split_at(self.chunk_size);
                Self::emit(&mut self.inner, segment)?;
                self.written += segment.len() as u64;
                rest = tail;
                continue;
            }
            let take = rest.len().min(self.chunk_size - self.buf.len());
            self.buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.buf.len() == self.chunk_size {
                Self::emit(&mut self.inner, &self.buf)?;
                self.written += self.buf.len() as u64;
                self.buf.clear();
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Incremental EnvelopedData writer.
///
/// The header is written to `W` by [`new`](Self::new); plaintext written to
/// the encoder is encrypted and appended as it arrives. [`finish`](Self::finish)
/// pads the last block, closes the structure and returns the writer. An
/// encoder dropped without `finish` closes the structure on a best-effort
/// basis and discards any error.
pub struct EnvelopeEncoder<W: Write> {
    cipher: Option<CbcEncryptor<ChunkWriter<W>>>,
    plaintext_len: u64,
}

impl<W: Write> EnvelopeEncoder<W> {
    pub fn new(
        mut writer: W,
        recipients: &[KeyTransRecipientInfo],
        content_key: &ContentKey,
        options: &EnvelopeOptions,
    ) -> Result<Self, CryptoError> {
        options.validate()?;
        if recipients.is_empty() {
            return Err(CryptoError::InvalidArgument(
                "an envelope needs at least one recipient".into(),
            ));
        }

        writer.write_all(&encode_prefix(recipients, content_key))?;
        let chunks = ChunkWriter::new(writer, options.chunk_size);
        let cipher = CbcEncryptor::new(chunks, content_key.key(), content_key.iv())?;
        tracing::debug!(
            recipients = recipients.len(),
            cipher = ?content_key.algorithm(),
            chunk_size = options.chunk_size,
            "envelope header written"
        );
        Ok(Self {
            cipher: Some(cipher),
            plaintext_len: 0,
        })
    }

    /// Plaintext bytes accepted so far.
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    /// Pad, close the structure, and hand back the writer.
    pub fn finish(mut self) -> Result<W, CryptoError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<W, CryptoError> {
        let cipher = self
            .cipher
            .take()
            .ok_or_else(|| CryptoError::InvalidArgument("envelope already finished".into()))?;
        let (writer, content_len) = cipher.finish()?.finish()?;
        tracing::debug!(
            plaintext_len = self.plaintext_len,
            ciphertext_len = content_len,
            "envelope finished"
        );
        Ok(writer)
    }
}

impl<W: Write> Write for EnvelopeEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let cipher = self
            .cipher
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "envelope already finished"))?;
        let n = cipher.write(buf)?;
        self.plaintext_len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.cipher.as_mut() {
            Some(cipher) => cipher.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for EnvelopeEncoder<W> {
    fn drop(&mut self) {
        if self.cipher.is_some() {
            if let Err(e) = self.finalize() {
                tracing::debug!(error = %e, "envelope finalization on drop failed");
            }
        }
    }
}

/// Encrypt everything `plaintext` yields into a complete envelope on `writer`.
pub fn encode_envelope<R: Read, W: Write>(
    mut plaintext: R,
    writer: W,
    recipients: &[KeyTransRecipientInfo],
    content_key: &ContentKey,
    options: &EnvelopeOptions,
) -> Result<W, CryptoError> {
    let mut encoder = EnvelopeEncoder::new(writer, recipients, content_key, options)?;
    io::copy(&mut plaintext, &mut encoder)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiks_types::CipherAlgId;

    use crate::enveloped::{AlgorithmIdentifier, RecipientIdentifier};

    fn dummy_recipient() -> KeyTransRecipientInfo {
        KeyTransRecipientInfo {
            version: 0,
            rid: RecipientIdentifier::IssuerAndSerial {
                issuer: vec![0x30, 0x00],
                serial: vec![0x01],
            },
            key_encryption_algorithm: AlgorithmIdentifier {
                oid: known::rsaes_oaep().to_der_value(),
                params: None,
            },
            encrypted_key: vec![0xEE; 8],
        }
    }

    fn test_key() -> ContentKey {
        ContentKey::from_parts(CipherAlgId::Aes256Cbc, &[0x11; 32], &[0x22; 16]).unwrap()
    }

    #[test]
    fn test_chunk_writer_segments() {
        let mut cw = ChunkWriter::new(Vec::new(), 16);
        cw.write_all(&[1u8; 10]).unwrap();
        cw.write_all(&[2u8; 30]).unwrap();
        let (out, written) = cw.finish().unwrap();
        assert_eq!(written, 40);
        // 16 + 16 + 8 with two-byte headers, then five end-of-contents
        assert_eq!(out.len(), 18 + 18 + 10 + 10);
        assert_eq!(&out[..2], &[0x04, 0x10]);
        assert_eq!(&out[36..38], &[0x04, 0x08]);
        assert!(out[46..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_plaintext_layout() {
        let out = encode_envelope(
            &b""[..],
            Vec::new(),
            &[dummy_recipient()],
            &test_key(),
            &EnvelopeOptions::default(),
        )
        .unwrap();
        assert_eq!(&out[..2], &[0x30, 0x80]);
        // one padding block: 04 10 <16 bytes>, then the trailer
        let tail = &out[out.len() - 28..];
        assert_eq!(&tail[..2], &[0x04, 0x10]);
        assert!(tail[18..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_splits_do_not_change_output() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        let opts = EnvelopeOptions {
            chunk_size: 1024,
            ..Default::default()
        };
        let recipients = [dummy_recipient()];

        let whole = encode_envelope(data.as_slice(), Vec::new(), &recipients, &test_key(), &opts).unwrap();

        let mut enc = EnvelopeEncoder::new(Vec::new(), &recipients, &test_key(), &opts).unwrap();
        for piece in data.chunks(333) {
            enc.write_all(piece).unwrap();
        }
        assert_eq!(enc.plaintext_len(), data.len() as u64);
        assert_eq!(enc.finish().unwrap(), whole);
    }

    #[test]
    fn test_drop_finalizes() {
        let recipients = [dummy_recipient()];
        let mut out = Vec::new();
        {
            let mut enc =
                EnvelopeEncoder::new(&mut out, &recipients, &test_key(), &EnvelopeOptions::default())
                    .unwrap();
            enc.write_all(b"dropped without finish").unwrap();
        }
        let expected = encode_envelope(
            &b"dropped without finish"[..],
            Vec::new(),
            &recipients,
            &test_key(),
            &EnvelopeOptions::default(),
        )
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_no_recipients_rejected() {
        assert!(matches!(
            EnvelopeEncoder::new(Vec::new(), &[], &test_key(), &EnvelopeOptions::default()),
            Err(CryptoError::InvalidArgument(_))
        ));
    }
}

//! Envelope encryption bound to one certificate and private key.

use std::io::{self, Cursor, Read, Write};

use fiks_crypto::keywrap::{self, OaepParams};
use fiks_crypto::{CbcDecryptor, ContentKey};
use fiks_types::{CipherAlgId, CryptoError};

use crate::enveloped::{
    EncryptedContentReader, EnvelopeDecoder, EnvelopeEncoder, EnvelopeOptions,
    KeyTransRecipientInfo, RecipientIdKind,
};
use crate::pkcs8::PrivateKey;
use crate::reader::{
    PemCertificateReader, PemKeyReader, RsaPrivateKeyReader, X509CertificateReader,
};
use crate::x509::Certificate;

/// Content cipher used for every envelope this service creates.
pub const CONTENT_CIPHER: CipherAlgId = CipherAlgId::Aes256Cbc;

/// Encrypts to, and decrypts for, a single recipient.
///
/// The service holds no per-call state: each call draws its own content key
/// and IV and owns its own streams, so one instance may be shared between
/// threads.
#[derive(Debug, Clone)]
pub struct CryptoService {
    certificate: Certificate,
    private_key: PrivateKey,
    options: EnvelopeOptions,
}

impl CryptoService {
    /// Bind a service to `certificate` (the recipient of new envelopes) and
    /// `private_key` (used to open envelopes addressed to `certificate`).
    pub fn new(certificate: Certificate, private_key: PrivateKey) -> Result<Self, CryptoError> {
        let max = keywrap::max_key_len(certificate.public_key(), OaepParams::SHA256);
        if max < CONTENT_CIPHER.key_len() {
            return Err(CryptoError::KeyTooLarge {
                len: CONTENT_CIPHER.key_len(),
                max,
            });
        }
        tracing::debug!(serial = %certificate.serial_hex(), "crypto service created");
        Ok(Self {
            certificate,
            private_key,
            options: EnvelopeOptions::default(),
        })
    }

    /// Build from PEM text with the default readers.
    pub fn from_pem(certificate_pem: &str, private_key_pem: &str) -> Result<Self, CryptoError> {
        Self::from_pem_with(
            certificate_pem,
            private_key_pem,
            &X509CertificateReader,
            &RsaPrivateKeyReader,
        )
    }

    /// Build from PEM text with caller-supplied readers.
    pub fn from_pem_with(
        certificate_pem: &str,
        private_key_pem: &str,
        cert_reader: &dyn PemCertificateReader,
        key_reader: &dyn PemKeyReader,
    ) -> Result<Self, CryptoError> {
        if certificate_pem.trim().is_empty() {
            return Err(CryptoError::InvalidArgument("certificate PEM is empty".into()));
        }
        if private_key_pem.trim().is_empty() {
            return Err(CryptoError::InvalidArgument("private key PEM is empty".into()));
        }
        let certificate = cert_reader.read_certificate(certificate_pem)?;
        let private_key = key_reader.read_private_key(private_key_pem)?;
        Self::new(certificate, private_key)
    }

    /// Replace the encoding options used for new envelopes.
    pub fn with_options(mut self, options: EnvelopeOptions) -> Result<Self, CryptoError> {
        options.validate()?;
        if options.recipient_id == RecipientIdKind::SubjectKeyId
            && self.certificate.subject_key_id().is_none()
        {
            return Err(CryptoError::InvalidArgument(
                "certificate has no subject key identifier".into(),
            ));
        }
        self.options = options;
        Ok(self)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn options(&self) -> &EnvelopeOptions {
        &self.options
    }

    /// Encrypt all of `plaintext` into an in-memory envelope positioned at
    /// its start.
    pub fn encrypt<R: Read>(&self, mut plaintext: R) -> Result<Cursor<Vec<u8>>, CryptoError> {
        let mut stream = self.create_encryption_stream()?;
        io::copy(&mut plaintext, &mut stream)?;
        Ok(Cursor::new(stream.finish()?))
    }

    /// Open an envelope addressed to this service's certificate.
    ///
    /// The returned stream yields plaintext as it is decrypted. Bytes read
    /// before the stream reports its end are unverified; use
    /// [`decrypt_to_vec`](Self::decrypt_to_vec) when that matters.
    pub fn decrypt<R: Read>(
        &self,
        ciphertext: R,
    ) -> Result<DecryptStream<EncryptedContentReader<R>>, CryptoError> {
        let decoder = EnvelopeDecoder::new(ciphertext)?;
        let header = decoder.header();
        let cek = header.recover_content_key(&self.certificate, &self.private_key)?;
        let iv = *header.iv();
        let content = decoder.into_content()?;
        Ok(DecryptStream {
            inner: CbcDecryptor::new(content, &cek, &iv)?,
        })
    }

    /// Decrypt fully, returning plaintext only once padding and the
    /// envelope trailer have been verified.
    pub fn decrypt_to_vec<R: Read>(&self, ciphertext: R) -> Result<Vec<u8>, CryptoError> {
        let mut stream = self.decrypt(ciphertext)?;
        let mut out = Vec::new();
        stream.read_to_end(&mut out)?;
        tracing::debug!(plaintext_len = out.len(), "envelope decrypted");
        Ok(out)
    }

    /// Open an envelope whose encrypted content is carried separately.
    pub fn decrypt_detached<R: Read, C: Read>(
        &self,
        envelope: R,
        content: C,
    ) -> Result<DecryptStream<C>, CryptoError> {
        let decoder = EnvelopeDecoder::new(envelope)?;
        let header = decoder.header();
        let cek = header.recover_content_key(&self.certificate, &self.private_key)?;
        let iv = *header.iv();
        decoder.finish()?;
        Ok(DecryptStream {
            inner: CbcDecryptor::new(content, &cek, &iv)?,
        })
    }

    /// Start an envelope that the caller fills incrementally.
    pub fn create_encryption_stream(&self) -> Result<EncodedStream, CryptoError> {
        Ok(EncodedStream {
            encoder: self.create_encryption_stream_into(Vec::new())?,
        })
    }

    /// As [`create_encryption_stream`](Self::create_encryption_stream), writing
    /// the envelope to `writer` instead of an owned buffer.
    pub fn create_encryption_stream_into<W: Write>(
        &self,
        writer: W,
    ) -> Result<EnvelopeEncoder<W>, CryptoError> {
        let content_key = ContentKey::generate(CONTENT_CIPHER)?;
        self.encoder_with_key(writer, &content_key)
    }

    fn encoder_with_key<W: Write>(
        &self,
        writer: W,
        content_key: &ContentKey,
    ) -> Result<EnvelopeEncoder<W>, CryptoError> {
        let recipient =
            KeyTransRecipientInfo::wrap(&self.certificate, content_key, self.options.recipient_id)?;
        EnvelopeEncoder::new(writer, &[recipient], content_key, &self.options)
    }
}

/// A writable envelope backed by an owned buffer.
///
/// Call [`finish`](Self::finish) to obtain the encoded envelope. Dropping
/// the stream finalizes it and releases the buffer.
pub struct EncodedStream {
    encoder: EnvelopeEncoder<Vec<u8>>,
}

impl EncodedStream {
    /// Plaintext bytes written so far.
    pub fn plaintext_len(&self) -> u64 {
        self.encoder.plaintext_len()
    }

    /// Close the envelope and return its encoding.
    pub fn finish(self) -> Result<Vec<u8>, CryptoError> {
        self.encoder.finish()
    }
}

impl Write for EncodedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Plaintext reader over an envelope's decrypted content.
pub struct DecryptStream<C: Read> {
    inner: CbcDecryptor<C>,
}

impl<C: Read> Read for DecryptStream<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_CRT: &str = include_str!("../tests/data/alice.crt");
    const ALICE_KEY: &str = include_str!("../tests/data/alice.key");

    fn alice() -> CryptoService {
        CryptoService::from_pem(ALICE_CRT, ALICE_KEY).unwrap()
    }

    #[test]
    fn test_roundtrip_small() {
        let svc = alice();
        let envelope = svc.encrypt(&b"hello envelope"[..]).unwrap();
        assert_eq!(envelope.position(), 0);
        assert_eq!(svc.decrypt_to_vec(envelope).unwrap(), b"hello envelope");
    }

    #[test]
    fn test_empty_pem_is_invalid_argument() {
        assert!(matches!(
            CryptoService::from_pem("", ALICE_KEY),
            Err(CryptoError::InvalidArgument(_))
        ));
        assert!(matches!(
            CryptoService::from_pem(ALICE_CRT, "  \n"),
            Err(CryptoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_custom_readers() {
        let cert_reader = |pem: &str| Certificate::from_pem(pem);
        let key_reader = |_: &str| -> Result<PrivateKey, CryptoError> {
            Err(CryptoError::KeyParseError("vault unavailable".into()))
        };
        let err = CryptoService::from_pem_with(ALICE_CRT, ALICE_KEY, &cert_reader, &key_reader)
            .unwrap_err();
        assert!(matches!(err, CryptoError::KeyParseError(_)));
    }

    #[test]
    fn test_subject_key_id_option_roundtrip() {
        let svc = alice()
            .with_options(EnvelopeOptions {
                recipient_id: RecipientIdKind::SubjectKeyId,
                ..Default::default()
            })
            .unwrap();
        let env = svc.encrypt(&b"by key id"[..]).unwrap().into_inner();
        let header = EnvelopeDecoder::new(env.as_slice()).unwrap().header().clone();
        assert_eq!(header.version, 2);
        assert_eq!(svc.decrypt_to_vec(env.as_slice()).unwrap(), b"by key id");
    }

    #[test]
    fn test_encrypt_with_injected_key_is_deterministic_apart_from_wrap() {
        let svc = alice();
        let ck = ContentKey::from_parts(CONTENT_CIPHER, &[9u8; 32], &[8u8; 16]).unwrap();
        let a = svc.encoder_with_key(Vec::new(), &ck).unwrap().finish().unwrap();
        let b = svc.encoder_with_key(Vec::new(), &ck).unwrap().finish().unwrap();
        // identical length, identical body, fresh OAEP randomness
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
        assert_eq!(a[a.len() - 28..], b[b.len() - 28..]);
    }
}

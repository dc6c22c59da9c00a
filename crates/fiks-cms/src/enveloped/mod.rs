//! CMS EnvelopedData (RFC 5652 section 6) with key-transport recipients.
//!
//! The structure is processed as a stream in both directions:
//! [`EnvelopeEncoder`] writes the header as soon as the recipient
//! information is known and then encrypts plaintext straight into the
//! output, while [`EnvelopeDecoder`] parses the header and exposes the
//! encrypted content as a reader.
//!
//! ```text
//! ContentInfo ::= SEQUENCE { contentType (envelopedData), [0] EXPLICIT EnvelopedData }
//! EnvelopedData ::= SEQUENCE {
//!     version, originatorInfo [0] OPTIONAL, recipientInfos SET OF RecipientInfo,
//!     encryptedContentInfo, unprotectedAttrs [1] OPTIONAL }
//! EncryptedContentInfo ::= SEQUENCE {
//!     contentType, contentEncryptionAlgorithm, encryptedContent [0] IMPLICIT OPTIONAL }
//! ```

mod decode;
mod encode;

pub use decode::{EncryptedContentReader, EnvelopeDecoder};
pub use encode::{encode_envelope, EnvelopeEncoder};

use fiks_crypto::keywrap::{self, OaepParams};
use fiks_crypto::ContentKey;
use fiks_types::{CipherAlgId, CryptoError, HashAlgId, AES_BLOCK_SIZE};
use fiks_utils::asn1::{tags, Decoder, Encoder, TagClass};
use fiks_utils::oid::{self, known, Oid};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::pkcs8::PrivateKey;
use crate::x509::Certificate;

/// Default size of each OCTET STRING segment of streamed content.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Upper bound for any single header element buffered while decoding.
pub(crate) const MAX_HEADER_ELEMENT: usize = 1 << 20;

// ── Options ──────────────────────────────────────────────────────────

/// How the recipient is identified inside a new envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecipientIdKind {
    /// Issuer Name and serial number (KTRI version 0).
    #[default]
    IssuerAndSerial,
    /// Subject key identifier extension value (KTRI version 2).
    SubjectKeyId,
}

/// Encoding knobs for new envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeOptions {
    pub recipient_id: RecipientIdKind,
    /// Bytes of ciphertext per definite-length OCTET STRING segment.
    pub chunk_size: usize,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self {
            recipient_id: RecipientIdKind::IssuerAndSerial,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl EnvelopeOptions {
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.chunk_size == 0 || self.chunk_size % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidArgument(format!(
                "chunk size must be a non-zero multiple of {AES_BLOCK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

// ── Types ────────────────────────────────────────────────────────────

/// AlgorithmIdentifier with raw OID value and raw parameter encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    pub oid: Vec<u8>,
    pub params: Option<Vec<u8>>,
}

impl AlgorithmIdentifier {
    fn new(oid: &Oid, params: Option<Vec<u8>>) -> Self {
        Self {
            oid: oid.to_der_value(),
            params,
        }
    }

    fn parse(dec: &mut Decoder<'_>) -> Result<Self, CryptoError> {
        let mut seq = dec.read_sequence()?;
        let oid = seq.read_oid()?.to_vec();
        let params = if seq.is_empty() {
            None
        } else {
            Some(seq.remaining().to_vec())
        };
        Ok(Self { oid, params })
    }

    fn encode(&self) -> Vec<u8> {
        let mut inner = Encoder::new();
        inner.write_oid(&self.oid);
        if let Some(params) = &self.params {
            inner.write_raw(params);
        }
        enc_seq(&inner.finish())
    }

    /// True when parameters are absent or an explicit NULL.
    fn params_absent(&self) -> bool {
        matches!(self.params.as_deref(), None | Some([tags::NULL, 0x00]))
    }
}

/// Recipient identifier (CHOICE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientIdentifier {
    /// Complete DER issuer Name plus the serial number INTEGER contents.
    IssuerAndSerial { issuer: Vec<u8>, serial: Vec<u8> },
    /// `[0] SubjectKeyIdentifier`
    SubjectKeyId(Vec<u8>),
}

/// Key transport recipient info (RFC 5652 section 6.2.1).
#[derive(Debug, Clone)]
pub struct KeyTransRecipientInfo {
    pub version: u32,
    pub rid: RecipientIdentifier,
    pub key_encryption_algorithm: AlgorithmIdentifier,
    /// Content-encryption key wrapped with RSAES-OAEP.
    pub encrypted_key: Vec<u8>,
}

/// Recipient info (CHOICE).
#[derive(Debug, Clone)]
pub enum RecipientInfo {
    KeyTransport(KeyTransRecipientInfo),
    /// kari, kekri, pwri or ori; kept as the raw encoding and never matched.
    Other { tag: u8, raw: Vec<u8> },
}

/// Everything in an envelope up to the encrypted content.
#[derive(Debug, Clone)]
pub struct EnvelopeHeader {
    pub version: u32,
    pub recipient_infos: Vec<RecipientInfo>,
    /// Inner content type OID value, normally id-data.
    pub content_type: Vec<u8>,
    pub content_encryption_algorithm: AlgorithmIdentifier,
    cipher: CipherAlgId,
    iv: [u8; AES_BLOCK_SIZE],
    content_present: bool,
}

// ── Key transport ────────────────────────────────────────────────────

impl KeyTransRecipientInfo {
    /// Wrap `content_key` for `recipient` using RSAES-OAEP with SHA-256.
    pub fn wrap(
        recipient: &Certificate,
        content_key: &ContentKey,
        kind: RecipientIdKind,
    ) -> Result<Self, CryptoError> {
        Self::wrap_with_rng(&mut OsRng, recipient, content_key, kind)
    }

    /// As [`wrap`](Self::wrap), drawing the OAEP seed from `rng`.
    pub fn wrap_with_rng<R: CryptoRng + RngCore>(
        rng: &mut R,
        recipient: &Certificate,
        content_key: &ContentKey,
        kind: RecipientIdKind,
    ) -> Result<Self, CryptoError> {
        let (version, rid) = match kind {
            RecipientIdKind::IssuerAndSerial => (
                0,
                RecipientIdentifier::IssuerAndSerial {
                    issuer: recipient.issuer_der().to_vec(),
                    serial: recipient.serial_number().to_vec(),
                },
            ),
            RecipientIdKind::SubjectKeyId => {
                let ski = recipient.subject_key_id().ok_or_else(|| {
                    CryptoError::InvalidArgument(
                        "certificate has no subject key identifier".into(),
                    )
                })?;
                (2, RecipientIdentifier::SubjectKeyId(ski.to_vec()))
            }
        };

        let params = OaepParams::SHA256;
        let encrypted_key = keywrap::wrap_key_with_rng(
            rng,
            content_key.key(),
            recipient.public_key(),
            params,
        )?;

        Ok(Self {
            version,
            rid,
            key_encryption_algorithm: AlgorithmIdentifier::new(
                &known::rsaes_oaep(),
                Some(encode_oaep_params(params)),
            ),
            encrypted_key,
        })
    }

    /// True if this entry addresses `cert`.
    pub fn matches(&self, cert: &Certificate) -> bool {
        match &self.rid {
            RecipientIdentifier::IssuerAndSerial { issuer, serial } => {
                cert.matches_issuer_serial(issuer, serial)
            }
            RecipientIdentifier::SubjectKeyId(ski) => cert.subject_key_id() == Some(ski.as_slice()),
        }
    }

    /// Decode the RSAES-OAEP parameters of the key encryption algorithm.
    pub fn oaep_params(&self) -> Result<OaepParams, CryptoError> {
        let alg = &self.key_encryption_algorithm;
        if !known::rsaes_oaep().matches(&alg.oid) {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "key transport {}",
                oid::describe(&alg.oid)
            )));
        }
        match &alg.params {
            None => Ok(OaepParams::SHA1_DEFAULT),
            Some(raw) => parse_oaep_params(raw),
        }
    }

    /// Unwrap the content key with `key`.
    pub fn unwrap_key(&self, key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let params = self.oaep_params()?;
        keywrap::unwrap_key(&self.encrypted_key, key.rsa(), params)
    }

    fn encode(&self) -> Vec<u8> {
        let mut inner = Encoder::new();
        inner.write_integer(&self.version.to_be_bytes());
        match &self.rid {
            RecipientIdentifier::IssuerAndSerial { issuer, serial } => {
                let mut ias = Encoder::new();
                ias.write_raw(issuer).write_tlv(tags::INTEGER, serial);
                inner.write_sequence(&ias.finish());
            }
            RecipientIdentifier::SubjectKeyId(ski) => {
                inner.write_context_specific(0, false, ski);
            }
        }
        inner
            .write_raw(&self.key_encryption_algorithm.encode())
            .write_octet_string(&self.encrypted_key);
        enc_seq(&inner.finish())
    }

    fn parse(contents: &[u8]) -> Result<Self, CryptoError> {
        let mut seq = Decoder::new(contents);
        let version = seq.read_small_uint()?;
        if version != 0 && version != 2 {
            return Err(CryptoError::malformed(format!(
                "unsupported KeyTransRecipientInfo version {version}"
            )));
        }

        let rid = if seq.peek_tag()?.to_byte() == Some(tags::SEQUENCE) {
            let mut ias = seq.read_sequence()?;
            let issuer = ias.read_raw()?;
            if issuer.first() != Some(&tags::SEQUENCE) {
                return Err(CryptoError::malformed("issuer is not a Name"));
            }
            let serial = ias.read_integer()?;
            ias.finish()?;
            RecipientIdentifier::IssuerAndSerial {
                issuer: issuer.to_vec(),
                serial: serial.to_vec(),
            }
        } else {
            let tlv = seq.read_context_specific(0, false)?;
            RecipientIdentifier::SubjectKeyId(tlv.value.to_vec())
        };

        let key_encryption_algorithm = AlgorithmIdentifier::parse(&mut seq)?;
        let encrypted_key = seq.read_octet_string()?.to_vec();
        seq.finish()?;

        Ok(Self {
            version,
            rid,
            key_encryption_algorithm,
            encrypted_key,
        })
    }
}

// ── Header ───────────────────────────────────────────────────────────

impl EnvelopeHeader {
    pub fn cipher(&self) -> CipherAlgId {
        self.cipher
    }

    pub fn iv(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.iv
    }

    /// False for envelopes whose encrypted content travels separately.
    pub fn has_content(&self) -> bool {
        self.content_present
    }

    pub fn key_transport_recipients(&self) -> impl Iterator<Item = &KeyTransRecipientInfo> {
        self.recipient_infos.iter().filter_map(|ri| match ri {
            RecipientInfo::KeyTransport(ktri) => Some(ktri),
            RecipientInfo::Other { .. } => None,
        })
    }

    /// Locate the key-transport entry addressed to `cert`.
    pub fn find_recipient(&self, cert: &Certificate) -> Result<&KeyTransRecipientInfo, CryptoError> {
        match self.key_transport_recipients().find(|ktri| ktri.matches(cert)) {
            Some(ktri) => {
                tracing::debug!(serial = %cert.serial_hex(), version = ktri.version, "matched recipient");
                Ok(ktri)
            }
            None => {
                tracing::warn!(
                    serial = %cert.serial_hex(),
                    recipients = self.recipient_infos.len(),
                    "no recipient info for certificate"
                );
                Err(CryptoError::NoMatchingRecipient)
            }
        }
    }

    /// Find the entry for `cert` and unwrap the content key with `key`.
    ///
    /// A key of the wrong length for the announced cipher is reported as
    /// [`CryptoError::UnwrapFailed`].
    pub fn recover_content_key(
        &self,
        cert: &Certificate,
        key: &PrivateKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let cek = self.find_recipient(cert)?.unwrap_key(key)?;
        if cek.len() != self.cipher.key_len() {
            return Err(CryptoError::UnwrapFailed);
        }
        Ok(cek)
    }
}

/// EnvelopedData version for a set of key-transport recipients.
fn envelope_version(recipients: &[KeyTransRecipientInfo]) -> u32 {
    if recipients.iter().all(|r| r.version == 0) {
        0
    } else {
        2
    }
}

fn parse_recipient_infos(set_der: &[u8]) -> Result<Vec<RecipientInfo>, CryptoError> {
    let mut outer = Decoder::new(set_der);
    let mut set = outer.read_set()?;
    outer.finish()?;

    let mut recipient_infos = Vec::new();
    while !set.is_empty() {
        let raw = set.read_raw()?;
        let mut one = Decoder::new(raw);
        let tlv = one.read_tlv()?;
        match tlv.tag.to_byte() {
            Some(tags::SEQUENCE) => recipient_infos.push(RecipientInfo::KeyTransport(
                KeyTransRecipientInfo::parse(tlv.value)?,
            )),
            Some(tag)
                if tlv.tag.class == TagClass::ContextSpecific
                    && (1..=4).contains(&tlv.tag.number) =>
            {
                recipient_infos.push(RecipientInfo::Other {
                    tag,
                    raw: raw.to_vec(),
                })
            }
            _ => {
                return Err(CryptoError::malformed(format!(
                    "unknown RecipientInfo tag {:?}",
                    tlv.tag
                )))
            }
        }
    }
    if recipient_infos.is_empty() {
        return Err(CryptoError::malformed("empty recipientInfos"));
    }
    Ok(recipient_infos)
}

// ── Algorithms ───────────────────────────────────────────────────────

fn cipher_oid(alg: CipherAlgId) -> Oid {
    match alg {
        CipherAlgId::Aes128Cbc => known::aes128_cbc(),
        CipherAlgId::Aes192Cbc => known::aes192_cbc(),
        CipherAlgId::Aes256Cbc => known::aes256_cbc(),
    }
}

fn content_cipher_identifier(content_key: &ContentKey) -> AlgorithmIdentifier {
    let mut iv = Encoder::new();
    iv.write_octet_string(content_key.iv());
    AlgorithmIdentifier::new(&cipher_oid(content_key.algorithm()), Some(iv.finish()))
}

fn parse_content_cipher(
    alg: &AlgorithmIdentifier,
) -> Result<(CipherAlgId, [u8; AES_BLOCK_SIZE]), CryptoError> {
    let cipher = [
        CipherAlgId::Aes128Cbc,
        CipherAlgId::Aes192Cbc,
        CipherAlgId::Aes256Cbc,
    ]
    .into_iter()
    .find(|c| cipher_oid(*c).matches(&alg.oid))
    .ok_or_else(|| {
        CryptoError::UnsupportedAlgorithm(format!("content cipher {}", oid::describe(&alg.oid)))
    })?;

    let params = alg
        .params
        .as_deref()
        .ok_or_else(|| CryptoError::malformed("content cipher without IV"))?;
    let mut dec = Decoder::new(params);
    let iv = dec.read_octet_string()?;
    dec.finish()?;
    let iv = iv
        .try_into()
        .map_err(|_| CryptoError::malformed(format!("IV must be {AES_BLOCK_SIZE} bytes")))?;
    Ok((cipher, iv))
}

fn hash_oid(hash: HashAlgId) -> Oid {
    match hash {
        HashAlgId::Sha1 => known::sha1(),
        HashAlgId::Sha256 => known::sha256(),
        HashAlgId::Sha384 => known::sha384(),
        HashAlgId::Sha512 => known::sha512(),
    }
}

fn parse_hash_identifier(dec: &mut Decoder<'_>) -> Result<HashAlgId, CryptoError> {
    let alg = AlgorithmIdentifier::parse(dec)?;
    if !alg.params_absent() {
        return Err(CryptoError::malformed("unexpected digest parameters"));
    }
    [
        HashAlgId::Sha1,
        HashAlgId::Sha256,
        HashAlgId::Sha384,
        HashAlgId::Sha512,
    ]
    .into_iter()
    .find(|h| hash_oid(*h).matches(&alg.oid))
    .ok_or_else(|| CryptoError::UnsupportedAlgorithm(format!("digest {}", oid::describe(&alg.oid))))
}

/// RSAES-OAEP-params with explicit hash and MGF1 hash, empty label.
fn encode_oaep_params(params: OaepParams) -> Vec<u8> {
    let hash = AlgorithmIdentifier::new(&hash_oid(params.hash), None).encode();
    let mgf_hash = AlgorithmIdentifier::new(&hash_oid(params.mgf_hash), None).encode();
    let mgf = AlgorithmIdentifier::new(&known::mgf1(), Some(mgf_hash)).encode();

    let mut inner = Encoder::new();
    inner
        .write_context_specific(0, true, &hash)
        .write_context_specific(1, true, &mgf);
    enc_seq(&inner.finish())
}

/// Parse RSAES-OAEP-params (RFC 4055 section 4.1); absent fields take the
/// SHA-1 defaults.
fn parse_oaep_params(raw: &[u8]) -> Result<OaepParams, CryptoError> {
    let mut outer = Decoder::new(raw);
    let mut seq = outer.read_sequence()?;
    outer.finish()?;

    let mut params = OaepParams::SHA1_DEFAULT;
    if let Some(tlv) = seq.try_read_context_specific(0, true)? {
        let mut dec = Decoder::new(tlv.value);
        params.hash = parse_hash_identifier(&mut dec)?;
        dec.finish()?;
    }
    if let Some(tlv) = seq.try_read_context_specific(1, true)? {
        let mut dec = Decoder::new(tlv.value);
        let mgf = AlgorithmIdentifier::parse(&mut dec)?;
        dec.finish()?;
        if !known::mgf1().matches(&mgf.oid) {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "mask generation {}",
                oid::describe(&mgf.oid)
            )));
        }
        let mgf_params = mgf
            .params
            .as_deref()
            .ok_or_else(|| CryptoError::malformed("MGF1 without hash"))?;
        let mut dec = Decoder::new(mgf_params);
        params.mgf_hash = parse_hash_identifier(&mut dec)?;
        dec.finish()?;
    }
    if let Some(tlv) = seq.try_read_context_specific(2, true)? {
        let mut dec = Decoder::new(tlv.value);
        let source = AlgorithmIdentifier::parse(&mut dec)?;
        let label = match &source.params {
            Some(p) if known::p_specified().matches(&source.oid) => {
                Decoder::new(p).read_octet_string()?.to_vec()
            }
            _ => Vec::new(),
        };
        if !known::p_specified().matches(&source.oid) || !label.is_empty() {
            return Err(CryptoError::UnsupportedAlgorithm("OAEP label".into()));
        }
    }
    seq.finish()?;
    Ok(params)
}

// ── DER helpers ──────────────────────────────────────────────────────

fn enc_seq(contents: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_sequence(contents);
    e.finish()
}

fn enc_oid(oid: &Oid) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_oid(&oid.to_der_value());
    e.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_oaep_params_sha256_encoding() {
        // As written by OpenSSL for -keyopt rsa_oaep_md:sha256
        let expected = hex_to_bytes(
            "302b a00d 300b 0609 608648016503040201
             a11a 3018 0609 2a864886f70d010108 300b 0609 608648016503040201",
        );
        assert_eq!(encode_oaep_params(OaepParams::SHA256), expected);
        assert_eq!(parse_oaep_params(&expected).unwrap(), OaepParams::SHA256);
    }

    #[test]
    fn test_oaep_params_defaults() {
        // Empty SEQUENCE: every field DEFAULT
        assert_eq!(
            parse_oaep_params(&[0x30, 0x00]).unwrap(),
            OaepParams::SHA1_DEFAULT
        );
    }

    #[test]
    fn test_oaep_params_with_null_digest_params() {
        // hashFunc sha384 with explicit NULL parameters, MGF defaulted
        let raw = hex_to_bytes("3011 a00f 300d 0609 608648016503040202 0500");
        let params = parse_oaep_params(&raw).unwrap();
        assert_eq!(params.hash, HashAlgId::Sha384);
        assert_eq!(params.mgf_hash, HashAlgId::Sha1);
    }

    #[test]
    fn test_oaep_label_rejected() {
        // pSourceFunc pSpecified with a non-empty label
        let raw = hex_to_bytes("3012 a210 300e 0609 2a864886f70d010109 0401ff");
        assert!(matches!(
            parse_oaep_params(&raw),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
        let empty = hex_to_bytes("3011 a20f 300d 0609 2a864886f70d010109 0400");
        assert_eq!(parse_oaep_params(&empty).unwrap(), OaepParams::SHA1_DEFAULT);
    }

    #[test]
    fn test_content_cipher_roundtrip() {
        let ck = ContentKey::from_parts(CipherAlgId::Aes256Cbc, &[1u8; 32], &[7u8; 16]).unwrap();
        let alg = content_cipher_identifier(&ck);
        let encoded = alg.encode();
        let parsed = AlgorithmIdentifier::parse(&mut Decoder::new(&encoded)).unwrap();
        assert_eq!(parsed, alg);
        let (cipher, iv) = parse_content_cipher(&parsed).unwrap();
        assert_eq!(cipher, CipherAlgId::Aes256Cbc);
        assert_eq!(iv, [7u8; 16]);
    }

    #[test]
    fn test_unknown_content_cipher() {
        let alg = AlgorithmIdentifier {
            // des-ede3-cbc
            oid: hex_to_bytes("2a864886f70d0307"),
            params: Some(hex_to_bytes("04080001020304050607")),
        };
        assert!(matches!(
            parse_content_cipher(&alg),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_short_iv_is_malformed() {
        let alg = AlgorithmIdentifier::new(&known::aes256_cbc(), Some(vec![0x04, 0x02, 0x00, 0x01]));
        assert!(matches!(
            parse_content_cipher(&alg),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_ktri_ski_roundtrip() {
        let ktri = KeyTransRecipientInfo {
            version: 2,
            rid: RecipientIdentifier::SubjectKeyId(vec![0xAB; 20]),
            key_encryption_algorithm: AlgorithmIdentifier::new(
                &known::rsaes_oaep(),
                Some(encode_oaep_params(OaepParams::SHA256)),
            ),
            encrypted_key: vec![0x55; 256],
        };
        let der = ktri.encode();
        let mut dec = Decoder::new(&der);
        let parsed = KeyTransRecipientInfo::parse(dec.read_sequence().unwrap().remaining()).unwrap();
        assert_eq!(parsed.version, 2);
        assert_eq!(parsed.rid, ktri.rid);
        assert_eq!(parsed.encrypted_key, ktri.encrypted_key);
        assert_eq!(parsed.oaep_params().unwrap(), OaepParams::SHA256);
    }

    #[test]
    fn test_pkcs1v15_key_transport_unsupported() {
        let ktri = KeyTransRecipientInfo {
            version: 0,
            rid: RecipientIdentifier::SubjectKeyId(vec![1]),
            key_encryption_algorithm: AlgorithmIdentifier::new(
                &known::rsa_encryption(),
                Some(vec![0x05, 0x00]),
            ),
            encrypted_key: vec![0; 256],
        };
        assert!(matches!(
            ktri.oaep_params(),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_recipient_infos_skip_other_choices() {
        // SET { [2] { ... opaque kekri ... } }
        let set = hex_to_bytes("3105 a203 020104");
        let infos = parse_recipient_infos(&set).unwrap();
        assert!(matches!(infos[0], RecipientInfo::Other { tag: 0xA2, .. }));
        assert!(parse_recipient_infos(&[0x31, 0x00]).is_err());
    }

    #[test]
    fn test_options_validate() {
        assert!(EnvelopeOptions::default().validate().is_ok());
        let bad = EnvelopeOptions {
            chunk_size: 100,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(CryptoError::InvalidArgument(_))));
        let zero = EnvelopeOptions {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_envelope_version() {
        let mut ktri = KeyTransRecipientInfo {
            version: 0,
            rid: RecipientIdentifier::SubjectKeyId(vec![1]),
            key_encryption_algorithm: AlgorithmIdentifier::new(&known::rsaes_oaep(), None),
            encrypted_key: vec![],
        };
        assert_eq!(envelope_version(std::slice::from_ref(&ktri)), 0);
        ktri.version = 2;
        assert_eq!(envelope_version(&[ktri]), 2);
    }
}

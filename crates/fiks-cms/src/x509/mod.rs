//! The slice of X.509 a key-transport recipient needs.
//!
//! Parses a DER certificate far enough to address a CMS recipient (issuer
//! Name and serial number, or the subject key identifier) and to wrap keys
//! for it (the RSA subject public key). Signatures, validity and chains are
//! not examined.

use std::fmt;

use fiks_types::CryptoError;
use fiks_utils::asn1::{tags, Decoder};
use fiks_utils::oid::{self, known};
use fiks_utils::pem;
use rsa::{BigUint, RsaPublicKey};

fn cert_err(e: impl fmt::Display) -> CryptoError {
    CryptoError::CertParseError(e.to_string())
}

/// A parsed X.509 certificate carrying an RSA public key.
#[derive(Clone)]
pub struct Certificate {
    raw: Vec<u8>,
    serial_number: Vec<u8>,
    issuer: Vec<u8>,
    subject: Vec<u8>,
    subject_key_id: Option<Vec<u8>>,
    public_key: RsaPublicKey,
}

impl Certificate {
    /// Parse a certificate from DER-encoded bytes.
    pub fn from_der(data: &[u8]) -> Result<Self, CryptoError> {
        if data.is_empty() {
            return Err(CryptoError::InvalidArgument("empty certificate".into()));
        }
        let mut outer = Decoder::new(data);
        let mut cert = outer.read_sequence().map_err(cert_err)?;
        outer.finish().map_err(cert_err)?;
        let mut tbs = cert.read_sequence().map_err(cert_err)?;

        // version [0] EXPLICIT INTEGER DEFAULT v1
        let version = match tbs.try_read_context_specific(0, true).map_err(cert_err)? {
            Some(tlv) => Decoder::new(tlv.value)
                .read_small_uint()
                .map_err(cert_err)?
                + 1,
            None => 1,
        };

        let serial_number = tbs.read_integer().map_err(cert_err)?.to_vec();
        // signature AlgorithmIdentifier
        tbs.read_expected(tags::SEQUENCE).map_err(cert_err)?;
        let issuer = read_name(&mut tbs)?;
        // validity
        tbs.read_expected(tags::SEQUENCE).map_err(cert_err)?;
        let subject = read_name(&mut tbs)?;
        let public_key = parse_rsa_spki(&mut tbs)?;

        // issuerUniqueID [1], subjectUniqueID [2]
        tbs.try_read_context_specific(1, false).map_err(cert_err)?;
        tbs.try_read_context_specific(2, false).map_err(cert_err)?;

        let subject_key_id = match tbs.try_read_context_specific(3, true).map_err(cert_err)? {
            Some(tlv) if version >= 3 => find_subject_key_id(tlv.value)?,
            Some(_) => return Err(cert_err("extensions in a pre-v3 certificate")),
            None => None,
        };

        Ok(Certificate {
            raw: data.to_vec(),
            serial_number,
            issuer,
            subject,
            subject_key_id,
            public_key,
        })
    }

    /// Parse the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let block = pem::find(pem, &["CERTIFICATE"]).map_err(cert_err)?;
        Self::from_der(&block.data)
    }

    pub fn to_der(&self) -> &[u8] {
        &self.raw
    }

    /// Serial number INTEGER contents as encoded (may carry a leading zero).
    pub fn serial_number(&self) -> &[u8] {
        &self.serial_number
    }

    /// Serial number as lowercase hex without sign padding, for logs.
    pub fn serial_hex(&self) -> String {
        strip_sign_byte(&self.serial_number)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Complete DER encoding of the issuer Name.
    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer
    }

    /// Complete DER encoding of the subject Name.
    pub fn subject_der(&self) -> &[u8] {
        &self.subject
    }

    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.subject_key_id.as_deref()
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// True if `issuer` and `serial` name this certificate.
    pub fn matches_issuer_serial(&self, issuer: &[u8], serial: &[u8]) -> bool {
        self.issuer == issuer
            && strip_sign_byte(&self.serial_number) == strip_sign_byte(serial)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("serial", &self.serial_hex())
            .field("has_ski", &self.subject_key_id.is_some())
            .finish_non_exhaustive()
    }
}

/// Drop redundant leading zero octets so equal values compare equal.
fn strip_sign_byte(int: &[u8]) -> &[u8] {
    let skip = int.iter().take_while(|&&b| b == 0).count();
    if skip == int.len() {
        &int[int.len().saturating_sub(1)..]
    } else {
        &int[skip..]
    }
}

fn read_name(dec: &mut Decoder<'_>) -> Result<Vec<u8>, CryptoError> {
    let tag = dec.peek_tag().map_err(cert_err)?;
    if tag.to_byte() != Some(tags::SEQUENCE) {
        return Err(cert_err("Name is not a SEQUENCE"));
    }
    Ok(dec.read_raw().map_err(cert_err)?.to_vec())
}

fn parse_rsa_spki(dec: &mut Decoder<'_>) -> Result<RsaPublicKey, CryptoError> {
    let mut spki = dec.read_sequence().map_err(cert_err)?;
    let mut alg = spki.read_sequence().map_err(cert_err)?;
    let alg_oid = alg.read_oid().map_err(cert_err)?;
    if !known::rsa_encryption().matches(alg_oid) {
        return Err(CryptoError::CertParseError(format!(
            "public key algorithm {} is not rsaEncryption",
            oid::describe(alg_oid)
        )));
    }
    let (unused_bits, key_bytes) = spki.read_bit_string().map_err(cert_err)?;
    if unused_bits != 0 {
        return Err(cert_err("RSA public key bit string is not octet aligned"));
    }

    // RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }
    let mut key_dec = Decoder::new(key_bytes);
    let mut key_seq = key_dec.read_sequence().map_err(cert_err)?;
    let n = key_seq.read_integer().map_err(cert_err)?;
    let e = key_seq.read_integer().map_err(cert_err)?;
    RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|e| CryptoError::CertParseError(format!("RSA public key: {e}")))
}

/// Walk `Extensions` and return the SubjectKeyIdentifier value if present.
fn find_subject_key_id(ext_data: &[u8]) -> Result<Option<Vec<u8>>, CryptoError> {
    let mut ext_seq = Decoder::new(ext_data).read_sequence().map_err(cert_err)?;
    while !ext_seq.is_empty() {
        let mut ext = ext_seq.read_sequence().map_err(cert_err)?;
        let ext_oid = ext.read_oid().map_err(cert_err)?;
        // critical BOOLEAN DEFAULT FALSE
        if ext.peek_tag().map_err(cert_err)?.to_byte() == Some(tags::BOOLEAN) {
            ext.read_boolean().map_err(cert_err)?;
        }
        let value = ext.read_octet_string().map_err(cert_err)?;
        if known::subject_key_identifier().matches(ext_oid) {
            let ski = Decoder::new(value).read_octet_string().map_err(cert_err)?;
            return Ok(Some(ski.to_vec()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;

    const ALICE_PEM: &str = include_str!("../../tests/data/alice.crt");
    const BOB_PEM: &str = include_str!("../../tests/data/bob.crt");

    #[test]
    fn test_parse_alice() {
        let cert = Certificate::from_pem(ALICE_PEM).unwrap();
        assert_eq!(cert.serial_number(), &[0x00, 0xC0, 0xFF, 0xEE, 0x01]);
        assert_eq!(cert.serial_hex(), "c0ffee01");
        assert_eq!(cert.public_key().size(), 256);
        assert_eq!(
            cert.subject_key_id().unwrap(),
            &[
                0xD1, 0xD3, 0xAE, 0xF5, 0x7F, 0x84, 0x7B, 0xBE, 0xD8, 0xFE, 0xA3, 0x8C, 0x8F,
                0xF4, 0x34, 0xCD, 0x10, 0x84, 0x00, 0xEB
            ]
        );
        // self-signed
        assert_eq!(cert.issuer_der(), cert.subject_der());
        assert_eq!(cert.issuer_der()[0], 0x30);
    }

    #[test]
    fn test_serial_matching_ignores_sign_byte() {
        let cert = Certificate::from_pem(ALICE_PEM).unwrap();
        let issuer = cert.issuer_der().to_vec();
        assert!(cert.matches_issuer_serial(&issuer, &[0xC0, 0xFF, 0xEE, 0x01]));
        assert!(cert.matches_issuer_serial(&issuer, &[0x00, 0xC0, 0xFF, 0xEE, 0x01]));
        assert!(!cert.matches_issuer_serial(&issuer, &[0xC0, 0xFF, 0xEE, 0x02]));
    }

    #[test]
    fn test_different_certificates_do_not_match() {
        let alice = Certificate::from_pem(ALICE_PEM).unwrap();
        let bob = Certificate::from_pem(BOB_PEM).unwrap();
        assert_eq!(bob.serial_hex(), "1092");
        assert!(!alice.matches_issuer_serial(bob.issuer_der(), bob.serial_number()));
        assert_ne!(alice.subject_key_id(), bob.subject_key_id());
    }

    #[test]
    fn test_from_pem_errors() {
        assert!(matches!(
            Certificate::from_pem("not a pem"),
            Err(CryptoError::CertParseError(_))
        ));
        let key = include_str!("../../tests/data/alice.key");
        assert!(matches!(
            Certificate::from_pem(key),
            Err(CryptoError::CertParseError(_))
        ));
    }

    #[test]
    fn test_truncated_der() {
        let der = pem::find(ALICE_PEM, &["CERTIFICATE"]).unwrap().data;
        assert!(matches!(
            Certificate::from_der(&der[..der.len() / 2]),
            Err(CryptoError::CertParseError(_))
        ));
        assert!(matches!(
            Certificate::from_der(&[]),
            Err(CryptoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_strip_sign_byte() {
        assert_eq!(strip_sign_byte(&[0x00, 0x80]), &[0x80]);
        assert_eq!(strip_sign_byte(&[0x00]), &[0x00]);
        assert_eq!(strip_sign_byte(&[0x00, 0x00]), &[0x00]);
        assert_eq!(strip_sign_byte(&[0x7F]), &[0x7F]);
    }
}

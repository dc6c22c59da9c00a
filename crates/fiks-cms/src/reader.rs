//! PEM collaborators used by [`CryptoService::from_pem`](crate::CryptoService::from_pem).
//!
//! Each trait is a single-operation contract so callers can substitute their
//! own certificate or key source (an HSM export, a different PEM flavour)
//! without touching the service.

use fiks_types::CryptoError;

use crate::pkcs8::PrivateKey;
use crate::x509::Certificate;

/// Extracts a recipient certificate from PEM text.
pub trait PemCertificateReader {
    /// Fails with [`CryptoError::CertParseError`] on malformed input.
    fn read_certificate(&self, pem: &str) -> Result<Certificate, CryptoError>;
}

/// Extracts a private key from PEM text.
pub trait PemKeyReader {
    /// Fails with [`CryptoError::KeyParseError`] on malformed input.
    fn read_private_key(&self, pem: &str) -> Result<PrivateKey, CryptoError>;
}

/// Reads the first `CERTIFICATE` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509CertificateReader;

impl PemCertificateReader for X509CertificateReader {
    fn read_certificate(&self, pem: &str) -> Result<Certificate, CryptoError> {
        Certificate::from_pem(pem)
    }
}

/// Reads a PKCS#8 `PRIVATE KEY` or PKCS#1 `RSA PRIVATE KEY` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaPrivateKeyReader;

impl PemKeyReader for RsaPrivateKeyReader {
    fn read_private_key(&self, pem: &str) -> Result<PrivateKey, CryptoError> {
        PrivateKey::from_pem(pem)
    }
}

impl<F> PemCertificateReader for F
where
    F: Fn(&str) -> Result<Certificate, CryptoError>,
{
    fn read_certificate(&self, pem: &str) -> Result<Certificate, CryptoError> {
        self(pem)
    }
}

impl<F> PemKeyReader for F
where
    F: Fn(&str) -> Result<PrivateKey, CryptoError>,
{
    fn read_private_key(&self, pem: &str) -> Result<PrivateKey, CryptoError> {
        self(pem)
    }
}

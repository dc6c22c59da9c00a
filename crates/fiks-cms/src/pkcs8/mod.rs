//! RSA private keys from PKCS#8 `PrivateKeyInfo` or PKCS#1 `RSAPrivateKey`.

use std::fmt;

use fiks_types::CryptoError;
use fiks_utils::pem;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;

const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const ENCRYPTED_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// An RSA private key able to unwrap content keys.
///
/// The inner key zeroizes its components on drop.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    /// Parse a DER-encoded PKCS#8 PrivateKeyInfo holding an RSA key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::KeyParseError(format!("PKCS#8: {e}")))?;
        Self::checked(inner)
    }

    /// Parse a DER-encoded PKCS#1 RSAPrivateKey.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| CryptoError::KeyParseError(format!("PKCS#1: {e}")))?;
        Self::checked(inner)
    }

    /// Parse the first `PRIVATE KEY` or `RSA PRIVATE KEY` block.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let block = pem::find(pem, &[PKCS8_LABEL, PKCS1_LABEL, ENCRYPTED_LABEL])
            .map_err(|e| CryptoError::KeyParseError(e.to_string()))?;
        match block.label.as_str() {
            PKCS8_LABEL => Self::from_pkcs8_der(&block.data),
            PKCS1_LABEL => Self::from_pkcs1_der(&block.data),
            _ => Err(CryptoError::KeyParseError(
                "password-protected keys are not supported".into(),
            )),
        }
    }

    fn checked(inner: RsaPrivateKey) -> Result<Self, CryptoError> {
        inner
            .validate()
            .map_err(|e| CryptoError::KeyParseError(format!("inconsistent RSA key: {e}")))?;
        Ok(Self { inner })
    }

    pub fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }

    /// Modulus length in bytes.
    pub fn size(&self) -> usize {
        self.inner.size()
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &(self.inner.size() * 8))
            .finish_non_exhaustive()
    }
}

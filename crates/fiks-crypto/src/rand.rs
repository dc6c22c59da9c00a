//! Fresh per-message content keys and IVs.

use std::fmt;

use fiks_types::{CipherAlgId, CryptoError, AES_BLOCK_SIZE};
use zeroize::Zeroizing;

/// A content-encryption key and IV for one envelope.
///
/// Never reuse a `ContentKey` across messages.
#[derive(Clone)]
pub struct ContentKey {
    alg: CipherAlgId,
    key: Zeroizing<Vec<u8>>,
    iv: [u8; AES_BLOCK_SIZE],
}

impl ContentKey {
    /// Draw a new key and IV from the operating system CSPRNG.
    pub fn generate(alg: CipherAlgId) -> Result<Self, CryptoError> {
        let mut key = Zeroizing::new(vec![0u8; alg.key_len()]);
        getrandom::getrandom(&mut key).map_err(|_| CryptoError::RandomFailed)?;
        let mut iv = [0u8; AES_BLOCK_SIZE];
        getrandom::getrandom(&mut iv).map_err(|_| CryptoError::RandomFailed)?;
        Ok(Self { alg, key, iv })
    }

    /// Build from caller-chosen material. Intended for tests and
    /// deterministic tooling; production callers use [`generate`](Self::generate).
    pub fn from_parts(alg: CipherAlgId, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != alg.key_len() {
            return Err(CryptoError::InvalidArgument(format!(
                "{alg:?} needs a {}-byte key, got {}",
                alg.key_len(),
                key.len()
            )));
        }
        let iv: [u8; AES_BLOCK_SIZE] = iv.try_into().map_err(|_| {
            CryptoError::InvalidArgument(format!("IV must be {AES_BLOCK_SIZE} bytes"))
        })?;
        Ok(Self {
            alg,
            key: Zeroizing::new(key.to_vec()),
            iv,
        })
    }

    pub fn algorithm(&self) -> CipherAlgId {
        self.alg
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.iv
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentKey")
            .field("alg", &self.alg)
            .field("key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_lengths() {
        let ck = ContentKey::generate(CipherAlgId::Aes256Cbc).unwrap();
        assert_eq!(ck.key().len(), 32);
        assert_eq!(ck.iv().len(), 16);
        let ck = ContentKey::generate(CipherAlgId::Aes128Cbc).unwrap();
        assert_eq!(ck.key().len(), 16);
    }

    #[test]
    fn test_generate_is_fresh() {
        let a = ContentKey::generate(CipherAlgId::Aes256Cbc).unwrap();
        let b = ContentKey::generate(CipherAlgId::Aes256Cbc).unwrap();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.iv(), b.iv());
    }

    #[test]
    fn test_from_parts_validates() {
        assert!(ContentKey::from_parts(CipherAlgId::Aes256Cbc, &[0u8; 16], &[0u8; 16]).is_err());
        assert!(ContentKey::from_parts(CipherAlgId::Aes256Cbc, &[0u8; 32], &[0u8; 8]).is_err());
        let ck = ContentKey::from_parts(CipherAlgId::Aes128Cbc, &[1u8; 16], &[2u8; 16]).unwrap();
        assert_eq!(ck.algorithm(), CipherAlgId::Aes128Cbc);
        assert_eq!(ck.iv(), &[2u8; 16]);
    }

    #[test]
    fn test_debug_redacts_key() {
        let ck = ContentKey::from_parts(CipherAlgId::Aes128Cbc, &[0xAB; 16], &[0; 16]).unwrap();
        let dbg = format!("{ck:?}");
        assert!(!dbg.contains("171"));
        assert!(!dbg.to_lowercase().contains("ab, "));
        assert!(dbg.contains("redacted"));
    }
}

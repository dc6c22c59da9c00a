//! AES block cipher keyed for one message.
//!
//! Wraps the `aes` crate's fixed-size ciphers behind one type selected by
//! key length; chaining modes live in [`cbc`](crate::cbc).

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use fiks_types::{CryptoError, AES_BLOCK_SIZE};

/// An expanded AES key (128, 192 or 256 bit).
#[derive(Clone)]
pub enum AesKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesKey {
    /// Create a new AES key from raw bytes.
    ///
    /// Accepts 16, 24, or 32-byte keys for AES-128, AES-192, and AES-256.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 => Ok(AesKey::Aes128(Aes128::new(GenericArray::from_slice(key)))),
            24 => Ok(AesKey::Aes192(Aes192::new(GenericArray::from_slice(key)))),
            32 => Ok(AesKey::Aes256(Aes256::new(GenericArray::from_slice(key)))),
            n => Err(CryptoError::InvalidArgument(format!(
                "AES key must be 16, 24 or 32 bytes, got {n}"
            ))),
        }
    }

    /// Encrypt a single block in place.
    pub fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesKey::Aes128(c) => c.encrypt_block(block),
            AesKey::Aes192(c) => c.encrypt_block(block),
            AesKey::Aes256(c) => c.encrypt_block(block),
        }
    }

    /// Decrypt a single block in place.
    pub fn decrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesKey::Aes128(c) => c.decrypt_block(block),
            AesKey::Aes192(c) => c.decrypt_block(block),
            AesKey::Aes256(c) => c.decrypt_block(block),
        }
    }

    /// Return the key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            AesKey::Aes128(_) => 16,
            AesKey::Aes192(_) => 24,
            AesKey::Aes256(_) => 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // FIPS 197 Appendix C.3: AES-256
    #[test]
    fn test_aes256_fips197_vector() {
        let key = hex_to_bytes("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
        let mut block: [u8; 16] = hex_to_bytes("00112233445566778899aabbccddeeff")
            .try_into()
            .unwrap();
        let cipher = AesKey::new(&key).unwrap();
        assert_eq!(cipher.key_len(), 32);
        cipher.encrypt_block(&mut block);
        assert_eq!(block.to_vec(), hex_to_bytes("8ea2b7ca516745bfeafc49904b496089"));
        cipher.decrypt_block(&mut block);
        assert_eq!(block.to_vec(), hex_to_bytes("00112233445566778899aabbccddeeff"));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            AesKey::new(&[0u8; 20]),
            Err(CryptoError::InvalidArgument(_))
        ));
    }
}

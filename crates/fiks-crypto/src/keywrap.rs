//! RSAES-OAEP key transport (RFC 8017 §7.1, parameters per RFC 4055).
//!
//! Wraps a content-encryption key to a recipient's RSA public key and
//! recovers it with the matching private key. Every unwrap failure is
//! reported as the same [`CryptoError::UnwrapFailed`] so callers cannot be
//! used as a padding oracle.

use fiks_types::{CryptoError, HashAlgId};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

/// Hash selection for RSAES-OAEP. The label is always empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OaepParams {
    pub hash: HashAlgId,
    pub mgf_hash: HashAlgId,
}

impl OaepParams {
    /// SHA-256 for both the label hash and MGF1; what new envelopes use.
    pub const SHA256: OaepParams = OaepParams {
        hash: HashAlgId::Sha256,
        mgf_hash: HashAlgId::Sha256,
    };

    /// The RFC 4055 defaults applied when the parameters are omitted.
    pub const SHA1_DEFAULT: OaepParams = OaepParams {
        hash: HashAlgId::Sha1,
        mgf_hash: HashAlgId::Sha1,
    };

    fn padding(self) -> Oaep {
        macro_rules! with_mgf {
            ($d:ty) => {
                match self.mgf_hash {
                    HashAlgId::Sha1 => Oaep::new_with_mgf_hash::<$d, sha1::Sha1>(),
                    HashAlgId::Sha256 => Oaep::new_with_mgf_hash::<$d, sha2::Sha256>(),
                    HashAlgId::Sha384 => Oaep::new_with_mgf_hash::<$d, sha2::Sha384>(),
                    HashAlgId::Sha512 => Oaep::new_with_mgf_hash::<$d, sha2::Sha512>(),
                }
            };
        }
        match self.hash {
            HashAlgId::Sha1 => with_mgf!(sha1::Sha1),
            HashAlgId::Sha256 => with_mgf!(sha2::Sha256),
            HashAlgId::Sha384 => with_mgf!(sha2::Sha384),
            HashAlgId::Sha512 => with_mgf!(sha2::Sha512),
        }
    }
}

impl Default for OaepParams {
    fn default() -> Self {
        OaepParams::SHA256
    }
}

/// Largest key that fits one OAEP block: k - 2*hLen - 2.
///
/// The bound is inclusive (RFC 8017 section 7.1.1: mLen <= k - 2hLen - 2).
pub fn max_key_len(public_key: &RsaPublicKey, params: OaepParams) -> usize {
    public_key
        .size()
        .saturating_sub(2 * params.hash.output_len() + 2)
}

/// Wrap `cek` to `public_key` using the operating system RNG.
pub fn wrap_key(
    cek: &[u8],
    public_key: &RsaPublicKey,
    params: OaepParams,
) -> Result<Vec<u8>, CryptoError> {
    wrap_key_with_rng(&mut OsRng, cek, public_key, params)
}

/// Wrap `cek` to `public_key` drawing the OAEP seed from `rng`.
///
/// The output is exactly the modulus length.
pub fn wrap_key_with_rng<R: CryptoRng + RngCore>(
    rng: &mut R,
    cek: &[u8],
    public_key: &RsaPublicKey,
    params: OaepParams,
) -> Result<Vec<u8>, CryptoError> {
    if cek.is_empty() {
        return Err(CryptoError::InvalidArgument(
            "content key must not be empty".into(),
        ));
    }
    let max = max_key_len(public_key, params);
    if cek.len() > max {
        return Err(CryptoError::KeyTooLarge {
            len: cek.len(),
            max,
        });
    }
    let wrapped = public_key
        .encrypt(rng, params.padding(), cek)
        .map_err(|_| CryptoError::KeyTooLarge {
            len: cek.len(),
            max,
        })?;
    tracing::trace!(
        modulus_len = public_key.size(),
        hash = ?params.hash,
        "wrapped content key"
    );
    Ok(wrapped)
}

/// Recover a content key wrapped by [`wrap_key`].
///
/// Decryption is blinded. A wrong key, a corrupted block and a length
/// mismatch all yield [`CryptoError::UnwrapFailed`].
pub fn unwrap_key(
    wrapped: &[u8],
    private_key: &RsaPrivateKey,
    params: OaepParams,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped.len() != private_key.size() {
        return Err(CryptoError::UnwrapFailed);
    }
    private_key
        .decrypt_blinded(&mut OsRng, params.padding(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::UnwrapFailed)
}

/// AES block size in bytes; every CBC ciphertext is a multiple of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// Hash algorithm identifiers usable inside RSAES-OAEP parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgId {
    /// Digest output length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgId::Sha1 => 20,
            HashAlgId::Sha256 => 32,
            HashAlgId::Sha384 => 48,
            HashAlgId::Sha512 => 64,
        }
    }
}

/// Content-encryption algorithms (AES in CBC mode with PKCS#7 padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl CipherAlgId {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            CipherAlgId::Aes128Cbc => 16,
            CipherAlgId::Aes192Cbc => 24,
            CipherAlgId::Aes256Cbc => 32,
        }
    }

    /// IV length in bytes (one AES block for every variant).
    pub fn iv_len(self) -> usize {
        AES_BLOCK_SIZE
    }

    /// Look up the variant for a raw key length.
    pub fn from_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(CipherAlgId::Aes128Cbc),
            24 => Some(CipherAlgId::Aes192Cbc),
            32 => Some(CipherAlgId::Aes256Cbc),
            _ => None,
        }
    }
}

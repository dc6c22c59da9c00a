#![forbid(unsafe_code)]
#![doc = "Key wrap and content cipher engines for fiks CMS envelopes."]

// Block cipher
pub mod aes;

// Content encryption (AES-CBC, PKCS#7 padding)
pub mod cbc;

// Key transport (RSAES-OAEP)
pub mod keywrap;

// Per-message content keys
pub mod rand;

pub use cbc::{CbcDecryptor, CbcEncryptor};
pub use keywrap::OaepParams;
pub use rand::ContentKey;

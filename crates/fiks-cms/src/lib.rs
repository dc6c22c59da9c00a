#![forbid(unsafe_code)]
#![doc = "CMS EnvelopedData encryption for a single RSA recipient."]

pub mod enveloped;
pub mod pkcs8;
pub mod reader;
pub mod service;
pub mod x509;

pub use enveloped::{EnvelopeOptions, RecipientIdKind};
pub use fiks_types::CryptoError;
pub use pkcs8::PrivateKey;
pub use reader::{PemCertificateReader, PemKeyReader, RsaPrivateKeyReader, X509CertificateReader};
pub use service::{CryptoService, DecryptStream, EncodedStream};
pub use x509::Certificate;

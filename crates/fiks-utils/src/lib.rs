#![forbid(unsafe_code)]
#![doc = "Utility layer for the fiks CMS envelope crates: ASN.1, PEM, OID."]

#[cfg(feature = "asn1")]
pub mod asn1;

#[cfg(feature = "pem")]
pub mod pem;

#[cfg(feature = "oid")]
pub mod oid;

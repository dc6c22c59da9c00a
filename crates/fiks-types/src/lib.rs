#![forbid(unsafe_code)]
#![doc = "Common error type and algorithm identifiers for the fiks CMS envelope crates."]

pub mod algorithm;
pub mod error;

pub use algorithm::*;
pub use error::*;

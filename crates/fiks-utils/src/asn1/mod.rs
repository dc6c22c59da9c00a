//! ASN.1 BER/DER encoding and decoding.
//!
//! [`Decoder`] walks an in-memory buffer, [`BerReader`] walks a byte stream
//! one header at a time so large contents never have to be buffered, and
//! [`Encoder`] produces DER.

mod decoder;
mod encoder;
mod reader;
mod tag;

pub use decoder::Decoder;
pub use encoder::{encode_header, Encoder, END_OF_CONTENTS};
pub use reader::{BerReader, Header, Length};

/// ASN.1 tag constants (identifier octets).
pub mod tags {
    pub const END_OF_CONTENTS: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const CONSTRUCTED: u8 = 0x20;
}

/// Represents a parsed ASN.1 tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
}

/// ASN.1 tag class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

/// A borrowed ASN.1 TLV element.
#[derive(Debug, Clone)]
pub struct Tlv<'a> {
    pub tag: Tag,
    pub value: &'a [u8],
}

/// Nesting limit for indefinite-length elements.
pub(crate) const MAX_DEPTH: usize = 32;

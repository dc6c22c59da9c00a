//! OID (Object Identifier) handling and the registry of identifiers used by
//! CMS enveloped data.

use fiks_types::CryptoError;

/// A parsed OID represented as a sequence of arc values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    /// Create an OID from a slice of arc values.
    pub fn new(arcs: &[u32]) -> Self {
        Self {
            arcs: arcs.to_vec(),
        }
    }

    /// Return the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Encode this OID to DER bytes (just the value, no tag/length).
    pub fn to_der_value(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let [first, second, rest @ ..] = self.arcs.as_slice() {
            encode_arc(&mut buf, first * 40 + second);
            for &arc in rest {
                encode_arc(&mut buf, arc);
            }
        }
        buf
    }

    /// Parse an OID from DER value bytes.
    pub fn from_der_value(data: &[u8]) -> Result<Self, CryptoError> {
        if data.is_empty() {
            return Err(CryptoError::malformed("empty OID"));
        }
        let (first, mut i) = decode_arc(data)?;
        let mut arcs = match first {
            0..=39 => vec![0, first],
            40..=79 => vec![1, first - 40],
            _ => vec![2, first - 80],
        };
        while i < data.len() {
            let (arc, consumed) = decode_arc(&data[i..])?;
            arcs.push(arc);
            i += consumed;
        }
        Ok(Self { arcs })
    }

    /// True if `der_value` is the DER value encoding of this OID.
    pub fn matches(&self, der_value: &[u8]) -> bool {
        self.to_der_value() == der_value
    }

    /// Return the dotted-string representation (e.g., "1.2.840.113549.1.7.3").
    pub fn to_dot_string(&self) -> String {
        self.arcs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_dot_string())
    }
}

fn encode_arc(buf: &mut Vec<u8>, value: u32) {
    let mut groups = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        groups.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    buf.extend(groups.iter().rev());
}

fn decode_arc(data: &[u8]) -> Result<(u32, usize), CryptoError> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > u32::MAX >> 7 {
            return Err(CryptoError::malformed("OID arc overflow"));
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CryptoError::malformed("truncated OID arc"))
}

/// Render a DER OID value for diagnostics, falling back to hex.
pub fn describe(der_value: &[u8]) -> String {
    match Oid::from_der_value(der_value) {
        Ok(oid) => oid.to_dot_string(),
        Err(_) => der_value.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

// Well-known OIDs
pub mod known {
    use super::Oid;

    // PKCS#7 / CMS content types
    pub fn pkcs7_data() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 7, 1])
    }
    pub fn pkcs7_enveloped_data() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 7, 3])
    }

    // RSA
    pub fn rsa_encryption() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 1])
    }
    pub fn rsaes_oaep() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 7])
    }
    pub fn mgf1() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 8])
    }
    pub fn p_specified() -> Oid {
        Oid::new(&[1, 2, 840, 113549, 1, 1, 9])
    }

    // Hash
    pub fn sha1() -> Oid {
        Oid::new(&[1, 3, 14, 3, 2, 26])
    }
    pub fn sha256() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 1])
    }
    pub fn sha384() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 2])
    }
    pub fn sha512() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 3])
    }

    // AES-CBC
    pub fn aes128_cbc() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 1, 2])
    }
    pub fn aes192_cbc() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 1, 22])
    }
    pub fn aes256_cbc() -> Oid {
        Oid::new(&[2, 16, 840, 1, 101, 3, 4, 1, 42])
    }

    // X.509 extensions
    pub fn subject_key_identifier() -> Oid {
        Oid::new(&[2, 5, 29, 14])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enveloped_data_encoding() {
        assert_eq!(
            known::pkcs7_enveloped_data().to_der_value(),
            vec![0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x03]
        );
    }

    #[test]
    fn test_aes256_cbc_encoding() {
        assert_eq!(
            known::aes256_cbc().to_der_value(),
            vec![0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2A]
        );
    }

    #[test]
    fn test_parse_known_value() {
        let oid = Oid::from_der_value(&[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x07])
            .unwrap();
        assert_eq!(oid, known::rsaes_oaep());
        assert_eq!(oid.to_string(), "1.2.840.113549.1.1.7");
    }

    #[test]
    fn test_joint_iso_arc_above_39() {
        let oid = Oid::new(&[2, 999, 3]);
        let der = oid.to_der_value();
        assert_eq!(der, vec![0x88, 0x37, 0x03]);
        assert_eq!(Oid::from_der_value(&der).unwrap(), oid);
    }

    #[test]
    fn test_truncated_arc_rejected() {
        assert!(Oid::from_der_value(&[0x2A, 0x86]).is_err());
        assert!(Oid::from_der_value(&[]).is_err());
    }

    #[test]
    fn test_describe_falls_back_to_hex() {
        assert_eq!(describe(&[0x55, 0x1D, 0x0E]), "2.5.29.14");
        assert_eq!(describe(&[0x86]), "86");
    }
}

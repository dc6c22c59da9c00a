use std::io;

/// Errors raised while wrapping keys, running the content cipher, or
/// encoding and decoding CMS envelopes.
///
/// Every error is terminal for the operation that raised it. Output already
/// written by a failed operation must not be treated as complete.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("certificate parse error: {0}")]
    CertParseError(String),
    #[error("private key parse error: {0}")]
    KeyParseError(String),

    // Key wrap
    #[error("content key too large for key transport: {len} bytes, max {max}")]
    KeyTooLarge { len: usize, max: usize },
    /// Deliberately carries no detail.
    #[error("key unwrap failed")]
    UnwrapFailed,

    // Content cipher
    #[error("invalid padding")]
    InvalidPadding,
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    // Envelope structure
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("no recipient info matches this certificate")]
    NoMatchingRecipient,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("random generation failed")]
    RandomFailed,
    #[error("io error: {0}")]
    Io(io::Error),
}

impl CryptoError {
    /// Shorthand for [`CryptoError::MalformedEnvelope`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        CryptoError::MalformedEnvelope(reason.into())
    }

    /// An equal error for adapters that report one failure on every later
    /// call. `Io` keeps its kind and message but not its source.
    pub fn replicate(&self) -> Self {
        match self {
            CryptoError::InvalidArgument(m) => CryptoError::InvalidArgument(m.clone()),
            CryptoError::CertParseError(m) => CryptoError::CertParseError(m.clone()),
            CryptoError::KeyParseError(m) => CryptoError::KeyParseError(m.clone()),
            CryptoError::KeyTooLarge { len, max } => CryptoError::KeyTooLarge {
                len: *len,
                max: *max,
            },
            CryptoError::UnwrapFailed => CryptoError::UnwrapFailed,
            CryptoError::InvalidPadding => CryptoError::InvalidPadding,
            CryptoError::MalformedCiphertext => CryptoError::MalformedCiphertext,
            CryptoError::MalformedEnvelope(m) => CryptoError::MalformedEnvelope(m.clone()),
            CryptoError::NoMatchingRecipient => CryptoError::NoMatchingRecipient,
            CryptoError::UnsupportedAlgorithm(m) => CryptoError::UnsupportedAlgorithm(m.clone()),
            CryptoError::RandomFailed => CryptoError::RandomFailed,
            CryptoError::Io(e) => CryptoError::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }

    /// True for I/O conditions a caller may retry (`WouldBlock`, `Interrupted`).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CryptoError::Io(e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
        )
    }
}

// Streaming adapters speak `io::Error`; a `CryptoError` travelling through
// one is boxed as the inner error and recovered here unchanged.
impl From<io::Error> for CryptoError {
    fn from(err: io::Error) -> Self {
        if err
            .get_ref()
            .is_some_and(|inner| inner.is::<CryptoError>())
        {
            if let Some(inner) = err.into_inner() {
                if let Ok(crypto) = inner.downcast::<CryptoError>() {
                    return *crypto;
                }
            }
            return CryptoError::malformed("lost inner error");
        }
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return CryptoError::malformed("truncated input");
        }
        CryptoError::Io(err)
    }
}

impl From<CryptoError> for io::Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_io_error() {
        let io_err: io::Error = CryptoError::InvalidPadding.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(
            CryptoError::from(io_err),
            CryptoError::InvalidPadding
        ));
    }

    #[test]
    fn test_unexpected_eof_is_malformed() {
        let err = CryptoError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_plain_io_error_is_preserved() {
        let err = CryptoError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        match err {
            CryptoError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_replicate_keeps_variant() {
        let err = CryptoError::malformed("truncated encrypted content");
        assert!(matches!(
            err.replicate(),
            CryptoError::MalformedEnvelope(ref m) if m == "truncated encrypted content"
        ));
        let io_err = CryptoError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        match io_err.replicate() {
            CryptoError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!io_err.is_transient());
        assert!(CryptoError::Io(io::ErrorKind::WouldBlock.into()).is_transient());
    }

    #[test]
    fn test_unwrap_failed_has_no_detail() {
        assert_eq!(CryptoError::UnwrapFailed.to_string(), "key unwrap failed");
    }
}

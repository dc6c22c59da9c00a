//! AES-CBC with PKCS#7 padding, as streaming adapters.
//!
//! [`CbcEncryptor`] is a `Write` adapter that encrypts whole blocks as soon as
//! they are available and pads on [`CbcEncryptor::finish`]. [`CbcDecryptor`]
//! is a `Read` adapter that always withholds the newest plaintext block until
//! the ciphertext is exhausted, so padding can be verified and stripped.
//! Both work in bounded memory regardless of message size.

use std::io::{self, Read, Write};

use fiks_types::{CryptoError, AES_BLOCK_SIZE};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::aes::AesKey;

/// Ciphertext is produced and consumed in slices of this many bytes.
const STREAM_CHUNK: usize = 64 * AES_BLOCK_SIZE;

fn check_iv(iv: &[u8]) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
    iv.try_into().map_err(|_| {
        CryptoError::InvalidArgument(format!(
            "CBC IV must be {AES_BLOCK_SIZE} bytes, got {}",
            iv.len()
        ))
    })
}

/// Streaming CBC encryptor writing ciphertext into `W`.
pub struct CbcEncryptor<W: Write> {
    inner: W,
    cipher: AesKey,
    chain: [u8; AES_BLOCK_SIZE],
    pending: [u8; AES_BLOCK_SIZE],
    pending_len: usize,
    scratch: Vec<u8>,
    written: u64,
}

impl<W: Write> CbcEncryptor<W> {
    pub fn new(inner: W, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            inner,
            cipher: AesKey::new(key)?,
            chain: check_iv(iv)?,
            pending: [0u8; AES_BLOCK_SIZE],
            pending_len: 0,
            scratch: Vec::with_capacity(STREAM_CHUNK),
            written: 0,
        })
    }

    fn encrypt_into_scratch(&mut self, block: &mut [u8; AES_BLOCK_SIZE]) {
        for (b, c) in block.iter_mut().zip(self.chain.iter()) {
            *b ^= c;
        }
        self.cipher.encrypt_block(block);
        self.chain = *block;
        self.scratch.extend_from_slice(block);
    }

    fn flush_scratch(&mut self) -> io::Result<()> {
        self.inner.write_all(&self.scratch)?;
        self.written += self.scratch.len() as u64;
        self.scratch.clear();
        Ok(())
    }

    /// Ciphertext bytes handed to the inner writer so far.
    pub fn ciphertext_len(&self) -> u64 {
        self.written
    }

    /// Pad the final block, write it, and return the inner writer.
    pub fn finish(mut self) -> Result<W, CryptoError> {
        let pad_len = AES_BLOCK_SIZE - self.pending_len;
        let mut block = self.pending;
        block[self.pending_len..].fill(pad_len as u8);
        self.encrypt_into_scratch(&mut block);
        self.flush_scratch()?;
        self.pending.zeroize();
        tracing::trace!(ciphertext_len = self.written, "cbc encryption finished");
        Ok(self.inner)
    }
}

impl<W: Write> Write for CbcEncryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;

        if self.pending_len > 0 {
            let take = rest.len().min(AES_BLOCK_SIZE - self.pending_len);
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&rest[..take]);
            self.pending_len += take;
            rest = &rest[take..];
            if self.pending_len < AES_BLOCK_SIZE {
                return Ok(buf.len());
            }
            let mut block = self.pending;
            self.encrypt_into_scratch(&mut block);
            self.pending_len = 0;
        }

        let mut blocks = rest.chunks_exact(AES_BLOCK_SIZE);
        for chunk in blocks.by_ref() {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.encrypt_into_scratch(&mut block);
            if self.scratch.len() >= STREAM_CHUNK {
                self.flush_scratch()?;
            }
        }
        let tail = blocks.remainder();
        self.pending[..tail.len()].copy_from_slice(tail);
        self.pending_len = tail.len();

        self.flush_scratch()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming CBC decryptor reading ciphertext from `R`.
pub struct CbcDecryptor<R: Read> {
    inner: R,
    cipher: AesKey,
    chain: [u8; AES_BLOCK_SIZE],
    input: Vec<u8>,
    held: Option<[u8; AES_BLOCK_SIZE]>,
    output: Vec<u8>,
    output_pos: usize,
    total: u64,
    done: bool,
    failed: Option<CryptoError>,
}

impl<R: Read> CbcDecryptor<R> {
    pub fn new(inner: R, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            inner,
            cipher: AesKey::new(key)?,
            chain: check_iv(iv)?,
            input: Vec::with_capacity(STREAM_CHUNK + AES_BLOCK_SIZE),
            held: None,
            output: Vec::with_capacity(STREAM_CHUNK),
            output_pos: 0,
            total: 0,
            done: false,
            failed: None,
        })
    }

    /// Pull the next slice of ciphertext and decrypt every complete block.
    fn refill(&mut self) -> Result<(), CryptoError> {
        self.output.zeroize();
        self.output.clear();
        self.output_pos = 0;

        let start = self.input.len();
        self.input.resize(start + STREAM_CHUNK, 0);
        let n = loop {
            match self.inner.read(&mut self.input[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.input.truncate(start);
                    return Err(e.into());
                }
            }
        };
        self.input.truncate(start + n);
        self.total += n as u64;

        if n == 0 {
            return self.finish_stream();
        }

        let whole = self.input.len() - self.input.len() % AES_BLOCK_SIZE;
        for chunk in self.input[..whole].chunks_exact(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            let next_chain = block;
            self.cipher.decrypt_block(&mut block);
            for (b, c) in block.iter_mut().zip(self.chain.iter()) {
                *b ^= c;
            }
            self.chain = next_chain;
            if let Some(prev) = self.held.replace(block) {
                self.output.extend_from_slice(&prev);
            }
        }
        self.input.drain(..whole);
        Ok(())
    }

    fn finish_stream(&mut self) -> Result<(), CryptoError> {
        if self.total == 0 || !self.input.is_empty() {
            return Err(CryptoError::MalformedCiphertext);
        }
        let mut last = self.held.take().ok_or(CryptoError::MalformedCiphertext)?;
        let plain_len = strip_padding(&last)?;
        self.output.extend_from_slice(&last[..plain_len]);
        last.zeroize();
        self.done = true;
        tracing::trace!(ciphertext_len = self.total, "cbc decryption finished");
        Ok(())
    }

    /// Total ciphertext bytes consumed so far.
    pub fn ciphertext_len(&self) -> u64 {
        self.total
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CbcDecryptor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_pos < self.output.len() {
                let n = buf.len().min(self.output.len() - self.output_pos);
                buf[..n].copy_from_slice(&self.output[self.output_pos..self.output_pos + n]);
                self.output_pos += n;
                return Ok(n);
            }
            if let Some(err) = &self.failed {
                return Err(err.replicate().into());
            }
            if self.done || buf.is_empty() {
                return Ok(0);
            }
            match self.refill() {
                Ok(()) => {}
                Err(err) if err.is_transient() => return Err(err.into()),
                Err(err) => {
                    // Failures are terminal; later reads see the same error.
                    if let Some(mut held) = self.held.take() {
                        held.zeroize();
                    }
                    self.output.zeroize();
                    self.output.clear();
                    self.output_pos = 0;
                    let reported = err.replicate();
                    self.failed = Some(err);
                    return Err(reported.into());
                }
            }
        }
    }
}

/// Validate PKCS#7 padding on the final block and return the data length.
fn strip_padding(block: &[u8; AES_BLOCK_SIZE]) -> Result<usize, CryptoError> {
    let pad_val = block[AES_BLOCK_SIZE - 1] as usize;
    if pad_val == 0 || pad_val > AES_BLOCK_SIZE {
        return Err(CryptoError::InvalidPadding);
    }
    let pad_byte = pad_val as u8;
    let mut valid = 1u8;
    for &b in &block[AES_BLOCK_SIZE - pad_val..] {
        valid &= b.ct_eq(&pad_byte).unwrap_u8();
    }
    if valid != 1 {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(AES_BLOCK_SIZE - pad_val)
}

/// Encrypt a whole buffer with CBC mode and PKCS#7 padding.
pub fn cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut enc = CbcEncryptor::new(Vec::with_capacity(plaintext.len() + AES_BLOCK_SIZE), key, iv)?;
    enc.write_all(plaintext)?;
    enc.finish()
}

/// Decrypt a whole buffer with CBC mode and remove PKCS#7 padding.
pub fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut dec = CbcDecryptor::new(ciphertext, key, iv)?;
    let mut out = Vec::with_capacity(ciphertext.len());
    dec.read_to_end(&mut out)?;
    Ok(out)
}

//! AES-256-CBC payload encryption with zero padding
//!
//! The payload is padded with zero bytes to a multiple of the block size and
//! encrypted without a padding scheme; the true length travels separately in
//! the container and decryption truncates back to it.

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use msqh_core::{MsqhError, MsqhResult};

use crate::{BLOCK_SIZE, KEY_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of `len` bytes once zero-padded to the block size.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Copy `plaintext` into a buffer zero-padded to the block size.
pub fn zero_pad(plaintext: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0u8; padded_len(plaintext.len())];
    buffer[..plaintext.len()].copy_from_slice(plaintext);
    buffer
}

/// The leading block of a padded buffer (empty if the buffer is empty).
pub fn head_block(padded: &[u8]) -> &[u8] {
    &padded[..padded.len().min(BLOCK_SIZE)]
}

/// Zero-pad and encrypt `plaintext`.
pub fn encrypt_payload(
    key: &[u8; KEY_SIZE],
    iv: &[u8; BLOCK_SIZE],
    plaintext: &[u8],
) -> MsqhResult<Vec<u8>> {
    let mut buffer = zero_pad(plaintext);
    let len = buffer.len();
    if len == 0 {
        return Ok(buffer);
    }
    Aes256CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|e| anyhow::anyhow!("payload encryption failed: {e}"))?;
    Ok(buffer)
}

/// Decrypt every block and truncate to the recorded plaintext length.
pub fn decrypt_payload(
    key: &[u8; KEY_SIZE],
    iv: &[u8; BLOCK_SIZE],
    ciphertext: &[u8],
    raw_len: usize,
) -> MsqhResult<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 || raw_len > ciphertext.len() {
        return Err(MsqhError::Malformed(format!(
            "ciphertext of {} bytes cannot hold {raw_len} plaintext bytes",
            ciphertext.len()
        )));
    }
    let mut buffer = ciphertext.to_vec();
    if buffer.is_empty() {
        return Ok(buffer);
    }
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| anyhow::anyhow!("payload decryption failed: {e}"))?;
    buffer.truncate(raw_len);
    Ok(buffer)
}

/// Decrypt only the leading block, for the candidate integrity check.
///
/// Returns an empty buffer when there is no ciphertext.
pub fn decrypt_head(
    key: &[u8; KEY_SIZE],
    iv: &[u8; BLOCK_SIZE],
    ciphertext: &[u8],
) -> MsqhResult<Vec<u8>> {
    let head = head_block(ciphertext);
    if head.is_empty() {
        return Ok(Vec::new());
    }
    decrypt_payload(key, iv, head, head.len())
}

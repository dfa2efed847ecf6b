//! Master key generation and per-combination key folding

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use msqh_core::MsqhResult;

use crate::combination::combinations;
use crate::digest::Word256;
use crate::KEY_SIZE;

/// The 256-bit key that actually encrypts the payload. Zeroized on drop.
///
/// Its little-endian byte form is the AES-256 key.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn to_word(&self) -> Word256 {
        Word256::from_le_bytes(self.bytes)
    }
}

impl From<Word256> for MasterKey {
    fn from(word: Word256) -> Self {
        Self::from_bytes(word.to_le_bytes())
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One derived key per size-`threshold` combination of `digests`, in
/// enumeration order.
///
/// `derived[i] = master ^ fold(digests, combination[i])`, so XOR-ing the
/// same correct digests back in recovers the master key.
pub fn derive_keys(
    master: &MasterKey,
    digests: &[Word256],
    threshold: u16,
) -> MsqhResult<Vec<Word256>> {
    let n = u16::try_from(digests.len()).unwrap_or(u16::MAX);
    let key = master.to_word();
    Ok(combinations(n, threshold)?
        .map(|combination| key ^ combination.fold(digests))
        .collect())
}

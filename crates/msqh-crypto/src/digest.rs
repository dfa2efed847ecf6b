//! Answer hashing and the 256-bit word shared by digests and keys
//!
//! Digests are kept in the same little-endian integer form the container
//! uses, so folding a digest into a key is a plain byte-wise XOR.

use std::fmt;
use std::ops::{BitXor, BitXorAssign};

use sha3::{Digest, Sha3_256};

use crate::DIGEST_SIZE;

/// A 256-bit value in little-endian byte order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Word256([u8; DIGEST_SIZE]);

impl Word256 {
    pub const ZERO: Self = Self([0u8; DIGEST_SIZE]);

    pub fn from_le_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn to_le_bytes(self) -> [u8; DIGEST_SIZE] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

impl BitXorAssign for Word256 {
    fn bitxor_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a ^= b;
        }
    }
}

impl BitXor for Word256 {
    type Output = Self;

    fn bitxor(mut self, rhs: Self) -> Self {
        self ^= rhs;
        self
    }
}

impl fmt::Debug for Word256 {
    // Most significant byte first, matching the integer the bytes encode
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word256(0x")?;
        for b in self.0.iter().rev() {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// SHA3-256 of `data` as a little-endian 256-bit word.
///
/// The digest is interpreted as a big-endian integer, so its little-endian
/// form is the digest with its bytes reversed.
pub fn hash_bytes(data: &[u8]) -> Word256 {
    let mut bytes: [u8; DIGEST_SIZE] = Sha3_256::digest(data).into();
    bytes.reverse();
    Word256(bytes)
}

/// Hash an answer's UTF-8 text.
pub fn hash_answer(answer: &str) -> Word256 {
    hash_bytes(answer.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_empty_matches_sha3_vector() {
        // SHA3-256("") = a7ffc6f8...80f8434a
        let h = hash_bytes(b"");
        assert_eq!(h.as_bytes()[0], 0x4a);
        assert_eq!(h.as_bytes()[1], 0x43);
        assert_eq!(h.as_bytes()[31], 0xa7);
        assert_eq!(h.as_bytes()[30], 0xff);
    }

    #[test]
    fn test_answer_hash_is_utf8() {
        assert_eq!(hash_answer("青"), hash_bytes("青".as_bytes()));
        assert_ne!(hash_answer("blue"), hash_answer("Blue"));
    }

    #[test]
    fn test_xor_self_inverse() {
        let a = hash_answer("blue");
        let b = hash_answer("cat");
        assert_eq!(a ^ b ^ b, a);
        assert_eq!(a ^ a, Word256::ZERO);
    }

    #[test]
    fn test_debug_is_big_endian_hex() {
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes[0] = 0x01;
        let rendered = format!("{:?}", Word256::from_le_bytes(bytes));
        assert!(rendered.ends_with("01)"));
        assert!(rendered.starts_with("Word256(0x00"));
    }

    proptest! {
        #[test]
        fn hash_is_deterministic(answer in ".{0,64}") {
            prop_assert_eq!(hash_answer(&answer), hash_answer(&answer));
        }
    }
}

//! msqh-crypto: "any m of n questions" file encryption
//!
//! A random master key encrypts the payload with AES-256-CBC. The master key
//! itself is never stored; instead, for every size-`m` subset of the `n`
//! questions, the container holds the master key XOR-folded with the SHA3-256
//! digests of that subset's answers.
//!
//! ```text
//! encrypt: answers ─SHA3─▶ digests ─┐
//!          master key ──────────────┴─▶ derived_key[i] = key ^ fold(digests, comb[i])
//!          plaintext ─zero-pad─▶ AES-256-CBC(key, iv) ─▶ container
//!
//! decrypt: answers ─SHA3─▶ digests ─▶ candidate[i] = derived_key[i] ^ fold(digests, comb[i])
//!          rank candidates by frequency ─▶ first block check ─▶ full decrypt
//! ```

pub mod cipher;
pub mod combination;
pub mod container;
pub mod digest;
pub mod engine;
pub mod keys;
pub mod matcher;

pub use combination::{binomial, combinations, validate_threshold, Combination, Combinations};
pub use container::Container;
pub use digest::{hash_answer, hash_bytes, Word256};
pub use engine::{
    collect_digests, open, seal, verify, AnswerProvider, EngineOptions, Opened, SealRequest,
    StaticAnswers, VerificationReport,
};
pub use keys::{derive_keys, MasterKey};
pub use matcher::{recover_master_key, tally, Candidate, FrequencyTable, Recovery};

/// Size of the master key and of every derived key (256-bit)
pub const KEY_SIZE: usize = 32;

/// AES block size; also the IV size for CBC
pub const BLOCK_SIZE: usize = 16;

/// Size of an answer digest (SHA3-256)
pub const DIGEST_SIZE: usize = 32;

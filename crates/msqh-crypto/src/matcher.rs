//! Candidate matching: recovering the master key from possibly-wrong answers
//!
//! Every combination re-derives a master key candidate from its stored key
//! and the supplied digests. Combinations made only of correct answers all
//! yield the true key; the rest yield unrelated noise. Candidates are ranked
//! by how often they occur and checked, most frequent first, by decrypting
//! the first block and comparing it against the stored head checksum.

use std::collections::HashMap;

use rayon::prelude::*;

use msqh_core::{MsqhError, MsqhResult};

use crate::cipher::decrypt_head;
use crate::combination::{combinations, Combination};
use crate::container::Container;
use crate::digest::{hash_bytes, Word256};
use crate::keys::MasterKey;

/// A distinct recomputed key and the combinations that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: Word256,
    /// Enumeration index of the first combination yielding this key
    pub first_index: usize,
    /// Producing combinations, ascending
    pub combinations: Vec<Combination>,
}

impl Candidate {
    pub fn count(&self) -> usize {
        self.combinations.len()
    }

    /// Union of the question indices of every producing combination.
    pub fn covered_positions(&self) -> u64 {
        self.combinations.iter().fold(0, |acc, c| acc | c.mask())
    }
}

/// Per-attempt mapping from candidate key to its occurrences.
#[derive(Debug, Default)]
pub struct FrequencyTable {
    entries: HashMap<Word256, Candidate>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, index: usize, combination: Combination, key: Word256) {
        self.entries
            .entry(key)
            .and_modify(|c| {
                c.first_index = c.first_index.min(index);
                c.combinations.push(combination);
            })
            .or_insert_with(|| Candidate {
                key,
                first_index: index,
                combinations: vec![combination],
            });
    }

    /// Combine two partial tables, as produced by separate shards.
    pub fn merge(mut self, other: Self) -> Self {
        for (key, theirs) in other.entries {
            match self.entries.get_mut(&key) {
                Some(ours) => {
                    ours.first_index = ours.first_index.min(theirs.first_index);
                    ours.combinations.extend(theirs.combinations);
                }
                None => {
                    self.entries.insert(key, theirs);
                }
            }
        }
        self
    }

    /// Number of distinct candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates by descending frequency; ties go to the one seen first.
    pub fn into_ranked(self) -> Vec<Candidate> {
        let mut ranked: Vec<Candidate> = self
            .entries
            .into_values()
            .map(|mut c| {
                c.combinations.sort_unstable();
                c
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.count()
                .cmp(&a.count())
                .then(a.first_index.cmp(&b.first_index))
        });
        ranked
    }
}

/// Build the frequency table for one decryption attempt.
///
/// `derived_keys` must be in enumeration order for `(digests.len(), threshold)`.
pub fn tally(
    derived_keys: &[Word256],
    digests: &[Word256],
    threshold: u16,
    parallel: bool,
) -> MsqhResult<FrequencyTable> {
    let n = u16::try_from(digests.len()).unwrap_or(u16::MAX);
    let combos = combinations(n, threshold)?;
    if combos.len() != derived_keys.len() {
        return Err(MsqhError::Malformed(format!(
            "{} derived keys for {} combinations",
            derived_keys.len(),
            combos.len()
        )));
    }

    let table = if parallel {
        let combos: Vec<Combination> = combos.collect();
        combos
            .par_iter()
            .zip(derived_keys.par_iter())
            .enumerate()
            .fold(FrequencyTable::new, |mut table, (i, (combination, stored))| {
                table.record(i, *combination, *stored ^ combination.fold(digests));
                table
            })
            .reduce(FrequencyTable::new, FrequencyTable::merge)
    } else {
        let mut table = FrequencyTable::new();
        for (i, (combination, stored)) in combos.zip(derived_keys).enumerate() {
            table.record(i, combination, *stored ^ combination.fold(digests));
        }
        table
    };
    Ok(table)
}

/// The accepted master key and how it was found.
#[derive(Debug)]
pub struct Recovery {
    pub master_key: MasterKey,
    pub candidate: Candidate,
    /// Zero-based position of the accepted candidate in the ranking
    pub rank: usize,
    pub distinct_candidates: usize,
}

/// Rank candidates and return the first whose decrypted head block hashes
/// to the container's checksum.
pub fn recover_master_key(
    container: &Container,
    digests: &[Word256],
    parallel: bool,
) -> MsqhResult<Recovery> {
    if digests.len() != container.questions.len() {
        return Err(MsqhError::InvalidParameters(format!(
            "{} answers supplied for {} questions",
            digests.len(),
            container.questions.len()
        )));
    }

    let table = tally(
        &container.derived_keys,
        digests,
        container.threshold,
        parallel,
    )?;
    let distinct_candidates = table.len();
    tracing::debug!(
        combinations = container.derived_keys.len(),
        distinct_candidates,
        "candidate table built"
    );

    for (rank, candidate) in table.into_ranked().into_iter().enumerate() {
        let head = decrypt_head(candidate.key.as_bytes(), &container.iv, &container.ciphertext)?;
        if hash_bytes(&head) == container.head_checksum {
            tracing::debug!(rank, count = candidate.count(), "candidate accepted");
            return Ok(Recovery {
                master_key: MasterKey::from(candidate.key),
                candidate,
                rank,
                distinct_candidates,
            });
        }
    }

    tracing::debug!(distinct_candidates, "no candidate passed the head check");
    Err(MsqhError::CouldNotDecrypt)
}

//! Seal / open / verify: the single entry point for both directions
//!
//! Interactive concerns stay outside: callers hand in answers through an
//! [`AnswerProvider`] and randomness through an explicit CSPRNG.

use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretString};

use msqh_core::{MsqhError, MsqhResult};

use crate::cipher::{decrypt_payload, encrypt_payload, zero_pad};
use crate::combination::{binomial, validate_threshold};
use crate::container::{
    Container, CIPHER_DESCRIPTION, FORMAT_MAJOR, FORMAT_MINOR, HASH_DESCRIPTION,
};
use crate::digest::{hash_answer, hash_bytes, Word256};
use crate::keys::{derive_keys, MasterKey};
use crate::matcher::{recover_master_key, Recovery};
use crate::BLOCK_SIZE;

/// Source of answers for a container's questions.
pub trait AnswerProvider {
    fn answer(&mut self, index: usize, question: &str) -> anyhow::Result<SecretString>;
}

/// Answers known up front, handed out in question order.
pub struct StaticAnswers {
    answers: Vec<SecretString>,
}

impl StaticAnswers {
    pub fn new(answers: Vec<SecretString>) -> Self {
        Self { answers }
    }
}

impl<S: AsRef<str>> FromIterator<S> for StaticAnswers {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|s| SecretString::from(s.as_ref().to_owned()))
                .collect(),
        )
    }
}

impl AnswerProvider for StaticAnswers {
    fn answer(&mut self, index: usize, _question: &str) -> anyhow::Result<SecretString> {
        self.answers
            .get(index)
            .map(|a| SecretString::from(a.expose_secret().to_owned()))
            .ok_or_else(|| anyhow::anyhow!("no answer for question {index}"))
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Build the candidate table on the rayon pool
    pub parallel: bool,
    /// Refuse to seal when C(n, m) exceeds this
    pub max_combinations: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            max_combinations: 1 << 20,
        }
    }
}

/// Everything needed to produce a container.
pub struct SealRequest<'a> {
    pub plaintext: &'a [u8],
    /// Stored for the default output name on decryption
    pub filename: &'a str,
    pub questions: &'a [String],
    pub answers: &'a [SecretString],
    pub threshold: u16,
}

/// Plaintext length as stored, once both it and its padded ciphertext are
/// known to fit the container's 32-bit length fields.
fn payload_length(len: usize) -> MsqhResult<u32> {
    let block = BLOCK_SIZE as u64;
    let raw = u32::try_from(len).ok();
    let padded = (len as u64)
        .div_ceil(block)
        .checked_mul(block)
        .and_then(|p| u32::try_from(p).ok());
    match (raw, padded) {
        (Some(raw), Some(_)) => Ok(raw),
        _ => Err(MsqhError::InvalidParameters(format!(
            "input too large: {len} bytes"
        ))),
    }
}

/// Encrypt a payload so that any `threshold` correct answers unlock it.
pub fn seal<R: RngCore + CryptoRng>(
    request: &SealRequest<'_>,
    options: &EngineOptions,
    rng: &mut R,
) -> MsqhResult<Container> {
    if request.questions.len() != request.answers.len() {
        return Err(MsqhError::InvalidParameters(format!(
            "{} answers for {} questions",
            request.answers.len(),
            request.questions.len()
        )));
    }
    let n = u16::try_from(request.questions.len()).map_err(|_| {
        MsqhError::InvalidParameters(format!("too many questions: {}", request.questions.len()))
    })?;
    validate_threshold(n, request.threshold)?;

    let key_count = binomial(u64::from(n), u64::from(request.threshold)).unwrap_or(u64::MAX);
    if key_count > options.max_combinations {
        return Err(MsqhError::InvalidParameters(format!(
            "{n} questions with threshold {} need {key_count} derived keys (limit {})",
            request.threshold, options.max_combinations
        )));
    }
    let raw_length = payload_length(request.plaintext.len())?;

    let digests: Vec<Word256> = request
        .answers
        .iter()
        .map(|a| hash_answer(a.expose_secret()))
        .collect();

    let master = MasterKey::generate(rng);
    let mut iv = [0u8; BLOCK_SIZE];
    rng.fill_bytes(&mut iv);

    let derived_keys = derive_keys(&master, &digests, request.threshold)?;
    let ciphertext = encrypt_payload(master.as_bytes(), &iv, request.plaintext)?;
    let head = &request.plaintext[..request.plaintext.len().min(BLOCK_SIZE)];
    let head_checksum = hash_bytes(&zero_pad(head));

    tracing::debug!(
        n,
        threshold = request.threshold,
        derived_keys = derived_keys.len(),
        bytes = raw_length,
        "sealed payload"
    );

    Ok(Container {
        major_version: FORMAT_MAJOR,
        minor_version: FORMAT_MINOR,
        threshold: request.threshold,
        derived_keys,
        iv,
        head_checksum,
        raw_length,
        hash_description: HASH_DESCRIPTION.into(),
        cipher_description: CIPHER_DESCRIPTION.into(),
        filename: request.filename.into(),
        questions: request.questions.to_vec(),
        ciphertext,
    })
}

/// Ask the provider every question and hash the answers right away.
pub fn collect_digests(
    container: &Container,
    provider: &mut dyn AnswerProvider,
) -> MsqhResult<Vec<Word256>> {
    container
        .questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let answer = provider.answer(i, question)?;
            Ok(hash_answer(answer.expose_secret()))
        })
        .collect()
}

/// A successfully decrypted container.
#[derive(Debug)]
pub struct Opened {
    pub plaintext: Vec<u8>,
    pub recovery: Recovery,
}

/// Recover the master key from `digests` and decrypt the whole payload.
pub fn open(
    container: &Container,
    digests: &[Word256],
    options: &EngineOptions,
) -> MsqhResult<Opened> {
    let recovery = recover_master_key(container, digests, options.parallel)?;
    let plaintext = decrypt_payload(
        recovery.master_key.as_bytes(),
        &container.iv,
        &container.ciphertext,
        container.raw_length as usize,
    )?;
    Ok(Opened {
        plaintext,
        recovery,
    })
}

/// Which questions were answered correctly, as inferred from the accepted
/// candidate's combinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub correct: Vec<bool>,
}

impl VerificationReport {
    pub fn correct_count(&self) -> usize {
        self.correct.iter().filter(|&&c| c).count()
    }

    pub fn total(&self) -> usize {
        self.correct.len()
    }

    /// One `o` (correct) or `x` (wrong) per question.
    pub fn markers(&self) -> String {
        self.correct.iter().map(|&c| if c { 'o' } else { 'x' }).collect()
    }
}

/// Compare the decrypted payload against a reference copy of the original.
///
/// On a match, every position covered by a combination that produced the
/// accepted key is reported as correct.
///
/// An empty payload has no head block to check, so any candidate opens it
/// and the accepted combinations say nothing about the answers.
pub fn verify(
    opened: &Opened,
    question_count: u16,
    reference: &[u8],
) -> MsqhResult<VerificationReport> {
    if hash_bytes(&opened.plaintext) != hash_bytes(reference) {
        return Err(MsqhError::PartialIntegrity);
    }
    if opened.plaintext.is_empty() {
        return Err(MsqhError::CorrectnessUnknown);
    }
    let covered = opened.recovery.candidate.covered_positions();
    let correct = (0..usize::from(question_count))
        .map(|i| (covered >> i) & 1 == 1)
        .collect();
    Ok(VerificationReport { correct })
}

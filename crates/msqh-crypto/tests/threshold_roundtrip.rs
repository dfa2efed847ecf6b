//! End-to-end tests for sealing and opening containers.
//!
//! Covers the "any m of n" unlock property, payload round-trips across block
//! boundaries, tamper detection, and correct-answer reporting.

use msqh_core::MsqhError;
use msqh_crypto::{
    collect_digests, combinations, hash_answer, open, seal, verify, Container, EngineOptions,
    SealRequest, StaticAnswers, Word256,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use secrecy::SecretString;

const ANSWERS: [&str; 5] = ["blue", "cat", "paris", "1999", "pizza"];

fn questions(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("question {i}?")).collect()
}

fn secrets(answers: &[&str]) -> Vec<SecretString> {
    answers
        .iter()
        .map(|a| SecretString::from(a.to_string()))
        .collect()
}

fn seal_with(answers: &[&str], threshold: u16, plaintext: &[u8], seed: u64) -> Container {
    let qs = questions(answers.len());
    let secret_answers = secrets(answers);
    let request = SealRequest {
        plaintext,
        filename: "payload.bin",
        questions: &qs,
        answers: &secret_answers,
        threshold,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let container = seal(&request, &EngineOptions::default(), &mut rng).expect("seal");
    // Always go through the on-disk form
    Container::from_bytes(&container.to_bytes().expect("encode")).expect("decode")
}

fn digests(answers: &[&str]) -> Vec<Word256> {
    answers.iter().map(|a| hash_answer(a)).collect()
}

/// Replace every answer whose bit is clear in `correct_mask` with a wrong one.
fn answers_with(correct_mask: u64, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            if (correct_mask >> i) & 1 == 1 {
                ANSWERS[i].to_string()
            } else {
                format!("wrong-{i}")
            }
        })
        .collect()
}

fn try_open(container: &Container, answers: &[String]) -> Result<Vec<u8>, MsqhError> {
    let d: Vec<Word256> = answers.iter().map(|a| hash_answer(a)).collect();
    open(container, &d, &EngineOptions::default()).map(|o| o.plaintext)
}

#[test]
fn two_questions_one_correct_scenario() {
    let qs = vec!["color?".to_string(), "pet?".to_string()];
    let secret_answers = secrets(&["blue", "cat"]);
    let request = SealRequest {
        plaintext: b"hi",
        filename: "hi.txt",
        questions: &qs,
        answers: &secret_answers,
        threshold: 1,
    };
    let mut rng = StdRng::seed_from_u64(2024);
    let container = seal(&request, &EngineOptions::default(), &mut rng).unwrap();
    let container = Container::from_bytes(&container.to_bytes().unwrap()).unwrap();

    let mut only_color: StaticAnswers = ["blue", "dog"].into_iter().collect();
    let d = collect_digests(&container, &mut only_color).unwrap();
    let opened = open(&container, &d, &EngineOptions::default()).unwrap();
    assert_eq!(opened.plaintext, b"hi");

    let mut both_wrong: StaticAnswers = ["red", "dog"].into_iter().collect();
    let d = collect_digests(&container, &mut both_wrong).unwrap();
    let err = open(&container, &d, &EngineOptions::default()).unwrap_err();
    assert!(matches!(err, MsqhError::CouldNotDecrypt));
    assert!(err.to_string().contains("could not decrypt"));
}

#[test]
fn any_three_of_five_unlock() {
    let plaintext = b"threshold secret payload spanning several AES blocks......";
    let container = seal_with(&ANSWERS, 3, plaintext, 11);

    for correct_mask in 0u64..32 {
        let answers = answers_with(correct_mask, 5);
        let result = try_open(&container, &answers);
        if correct_mask.count_ones() >= 3 {
            assert_eq!(
                result.expect("enough correct answers"),
                plaintext,
                "mask {correct_mask:05b}"
            );
        } else {
            assert!(
                matches!(result, Err(MsqhError::CouldNotDecrypt)),
                "mask {correct_mask:05b} must not decrypt"
            );
        }
    }
}

#[test]
fn parallel_matching_agrees_with_sequential() {
    let container = seal_with(&ANSWERS, 2, b"parallel", 5);
    let answers = answers_with(0b10110, 5);
    let d: Vec<Word256> = answers.iter().map(|a| hash_answer(a)).collect();

    let seq = open(&container, &d, &EngineOptions::default()).unwrap();
    let par = open(
        &container,
        &d,
        &EngineOptions {
            parallel: true,
            ..EngineOptions::default()
        },
    )
    .unwrap();

    assert_eq!(seq.plaintext, par.plaintext);
    assert_eq!(seq.recovery.candidate, par.recovery.candidate);
    assert_eq!(seq.recovery.rank, par.recovery.rank);
}

#[test]
fn true_key_ranks_first_with_surplus_answers() {
    let container = seal_with(&ANSWERS, 2, b"ranking", 8);
    let opened = open(&container, &digests(&ANSWERS), &EngineOptions::default()).unwrap();

    // All ten combinations agree on the true key
    assert_eq!(opened.recovery.rank, 0);
    assert_eq!(opened.recovery.candidate.count(), 10);
    assert_eq!(opened.recovery.distinct_candidates, 1);
}

#[test]
fn round_trip_across_block_boundaries() {
    for len in [0usize, 1, 2, 15, 16, 17, 31, 32, 33, 100, 4096] {
        let plaintext: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
        let container = seal_with(&ANSWERS[..3], 2, &plaintext, len as u64);
        assert_eq!(container.raw_length as usize, len);
        assert_eq!(container.ciphertext.len() % 16, 0);

        let answers = answers_with(0b011, 3);
        assert_eq!(try_open(&container, &answers).unwrap(), plaintext, "len {len}");
    }
}

#[test]
fn digests_are_stable_across_seal_and_open() {
    assert_eq!(hash_answer("cat"), hash_answer("cat"));
    let a = seal_with(&ANSWERS, 5, b"same", 1);
    let b = seal_with(&ANSWERS, 5, b"same", 2);
    // Different master keys, same answers: both open with the same digests
    assert_ne!(a.derived_keys, b.derived_keys);
    assert_eq!(try_open(&a, &answers_with(0b11111, 5)).unwrap(), b"same");
    assert_eq!(try_open(&b, &answers_with(0b11111, 5)).unwrap(), b"same");
}

#[test]
fn tampered_iv_never_accepted() {
    let mut container = seal_with(&ANSWERS, 3, b"tamper target payload", 21);
    container.iv[7] ^= 0x01;
    let err = try_open(&container, &answers_with(0b11111, 5)).unwrap_err();
    assert!(matches!(err, MsqhError::CouldNotDecrypt));
}

#[test]
fn tampered_first_ciphertext_block_never_accepted() {
    let container = seal_with(&ANSWERS, 3, b"tamper target payload", 22);
    for bit in [0usize, 9, 64, 127] {
        let mut tampered = container.clone();
        tampered.ciphertext[bit / 8] ^= 1 << (bit % 8);
        let err = try_open(&tampered, &answers_with(0b11111, 5)).unwrap_err();
        assert!(matches!(err, MsqhError::CouldNotDecrypt), "bit {bit}");
    }
}

#[test]
fn tampered_derived_key_blocks_its_only_route() {
    // With exactly m correct answers only one combination reaches the key
    let container = seal_with(&ANSWERS, 3, b"single route", 23);
    let correct_mask = 0b01011u64;
    let index = combinations(5, 3)
        .unwrap()
        .position(|c| c.mask() == correct_mask)
        .unwrap();

    let answers = answers_with(correct_mask, 5);
    assert!(try_open(&container, &answers).is_ok());

    let mut tampered = container.clone();
    let mut bytes = tampered.derived_keys[index].to_le_bytes();
    bytes[31] ^= 0x80;
    tampered.derived_keys[index] = Word256::from_le_bytes(bytes);
    let err = try_open(&tampered, &answers).unwrap_err();
    assert!(matches!(err, MsqhError::CouldNotDecrypt));
}

#[test]
fn later_block_tamper_caught_by_verification() {
    let plaintext = vec![0x5Au8; 64];
    let mut container = seal_with(&ANSWERS, 2, &plaintext, 24);
    container.ciphertext[40] ^= 0x01;

    let opened = open(&container, &digests(&ANSWERS), &EngineOptions::default()).unwrap();
    assert_ne!(opened.plaintext, plaintext);
    let err = verify(&opened, 5, &plaintext).unwrap_err();
    assert!(matches!(err, MsqhError::PartialIntegrity));
}

#[test]
fn verification_counts_correct_answers() {
    let plaintext = b"reference document contents";
    let container = seal_with(&ANSWERS[..4], 2, plaintext, 31);

    for correct_mask in 0u64..16 {
        let answers = answers_with(correct_mask, 4);
        let d: Vec<Word256> = answers.iter().map(|a| hash_answer(a)).collect();
        match open(&container, &d, &EngineOptions::default()) {
            Ok(opened) => {
                let report = verify(&opened, 4, plaintext).unwrap();
                assert_eq!(
                    report.correct_count(),
                    correct_mask.count_ones() as usize,
                    "mask {correct_mask:04b}"
                );
                for i in 0..4 {
                    assert_eq!(report.correct[i], (correct_mask >> i) & 1 == 1);
                }
            }
            Err(err) => {
                assert!(correct_mask.count_ones() < 2, "mask {correct_mask:04b}");
                assert!(matches!(err, MsqhError::CouldNotDecrypt));
            }
        }
    }
}

#[test]
fn verification_markers_for_all_correct() {
    let plaintext = b"all correct";
    let container = seal_with(&ANSWERS, 3, plaintext, 32);
    let opened = open(&container, &digests(&ANSWERS), &EngineOptions::default()).unwrap();
    let report = verify(&opened, 5, plaintext).unwrap();
    assert_eq!(report.markers(), "ooooo");
    assert_eq!(report.correct_count(), 5);
}

#[test]
fn wrong_answer_count_rejected() {
    let container = seal_with(&ANSWERS, 3, b"x", 40);
    let err = open(&container, &digests(&ANSWERS[..4]), &EngineOptions::default()).unwrap_err();
    assert!(matches!(err, MsqhError::InvalidParameters(_)));
}

#[test]
fn foreign_file_is_unsupported() {
    let err = Container::from_bytes(b"PK\x03\x04 definitely a zip file").unwrap_err();
    assert!(matches!(err, MsqhError::UnsupportedFormat(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn any_threshold_subset_round_trips(
        data in proptest::collection::vec(any::<u8>(), 0..=200),
        seed in any::<u64>(),
        correct_mask in 0u64..16,
    ) {
        let container = seal_with(&ANSWERS[..4], 2, &data, seed);
        let answers = answers_with(correct_mask, 4);
        let result = try_open(&container, &answers);
        if correct_mask.count_ones() >= 2 || data.is_empty() {
            prop_assert_eq!(result.unwrap(), data);
        } else {
            prop_assert!(matches!(result, Err(MsqhError::CouldNotDecrypt)));
        }
    }
}

use msqh_crypto::{hash_answer, open, seal, tally, EngineOptions, SealRequest, Word256};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secrecy::SecretString;

fn questionnaire(n: usize) -> (Vec<String>, Vec<SecretString>, Vec<Word256>) {
    let questions = (0..n).map(|i| format!("question {i}")).collect();
    let answers = (0..n)
        .map(|i| SecretString::from(format!("answer {i}")))
        .collect();
    let digests = (0..n).map(|i| hash_answer(&format!("answer {i}"))).collect();
    (questions, answers, digests)
}

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn sealed(n: usize, m: u16, size: usize) -> (msqh_crypto::Container, Vec<Word256>) {
    let (questions, answers, digests) = questionnaire(n);
    let data = make_data(size);
    let request = SealRequest {
        plaintext: &data,
        filename: "bench.bin",
        questions: &questions,
        answers: &answers,
        threshold: m,
    };
    let mut rng = StdRng::seed_from_u64(0);
    let container = seal(&request, &EngineOptions::default(), &mut rng).unwrap();
    (container, digests)
}

/// `n` questions with threshold `n / 2`, the widest combination space
#[divan::bench(args = [10, 16, 20])]
fn bench_tally(bencher: divan::Bencher, n: usize) {
    let m = (n / 2) as u16;
    let (container, digests) = sealed(n, m, 16);
    bencher.bench(|| {
        tally(
            divan::black_box(&container.derived_keys),
            divan::black_box(&digests),
            m,
            false,
        )
        .unwrap()
    });
}

#[divan::bench(args = [16, 20])]
fn bench_tally_parallel(bencher: divan::Bencher, n: usize) {
    let m = (n / 2) as u16;
    let (container, digests) = sealed(n, m, 16);
    bencher.bench(|| {
        tally(
            divan::black_box(&container.derived_keys),
            divan::black_box(&digests),
            m,
            true,
        )
        .unwrap()
    });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_open(bencher: divan::Bencher, size: usize) {
    let (container, digests) = sealed(8, 4, size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            open(
                divan::black_box(&container),
                divan::black_box(&digests),
                &EngineOptions::default(),
            )
            .unwrap()
        });
}

fn main() {
    divan::main();
}

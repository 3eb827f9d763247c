//! Benchmarks for RNS polynomial and BFV operations.
#![cfg(feature = "benchmark")]

use bfv_core::bfv::params::{ParameterSet, SecurityLevel};
use bfv_core::bfv::{scheme, Context, Plaintext};
use bfv_core::keyswitch::{generate_relinearization_key, relinearize, SecretKey};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

criterion_group! {
    name = bench_bfv_ops;
    config = Criterion::default().sample_size(20);
    targets = bench_encrypt, bench_decrypt, bench_multiply_and_relinearize
}

criterion_main!(bench_bfv_ops);

fn bench_params() -> ParameterSet {
    ParameterSet {
        degree: 4096,
        plaintext_modulus: 17,
        coefficient_moduli_bits: vec![27, 28, 28],
        error_std_dev_milli: 3200,
        security_level: SecurityLevel::Classical128,
    }
}

fn sample_plaintext(ctx: &Context) -> Plaintext<bfv_core::poly::Coeff> {
    let mut values = vec![0u64; ctx.degree()];
    values[0] = 5;
    Plaintext::new(ctx, values).unwrap()
}

/// Fresh BFV encryption, the cost every homomorphic computation starts from.
pub fn bench_encrypt(settings: &mut Criterion) {
    let ctx = Context::new(bench_params()).unwrap();
    let mut rng = rand::thread_rng();
    let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
    let pt = sample_plaintext(&ctx);

    settings.bench_with_input(BenchmarkId::new("encrypt", "n_4096_logq_27_28_28"), &(ctx, sk, pt), |benchmark, (ctx, sk, pt)| {
        benchmark.iter(|| scheme::encrypt(ctx, sk, pt, &mut rand::thread_rng()).unwrap())
    });
}

/// Decryption, dominated by the same degree-`N` NTT cost as encryption.
pub fn bench_decrypt(settings: &mut Criterion) {
    let ctx = Context::new(bench_params()).unwrap();
    let mut rng = rand::thread_rng();
    let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
    let pt = sample_plaintext(&ctx);
    let ct = scheme::encrypt(&ctx, &sk, &pt, &mut rng).unwrap();

    settings.bench_with_input(BenchmarkId::new("decrypt", "n_4096_logq_27_28_28"), &(ctx, ct, sk), |benchmark, (ctx, ct, sk)| {
        benchmark.iter(|| scheme::decrypt_coeff(ctx, ct, sk).unwrap())
    });
}

/// The BEHZ multiply-and-rescale pipeline plus relinearization, the most
/// expensive single operation this crate exposes.
pub fn bench_multiply_and_relinearize(settings: &mut Criterion) {
    let ctx = Context::new(bench_params()).unwrap();
    let mut rng = rand::thread_rng();
    let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
    let rlk = generate_relinearization_key(&ctx, &sk, &mut rng).unwrap();
    let pt = sample_plaintext(&ctx);
    let ct_a = scheme::encrypt(&ctx, &sk, &pt, &mut rng).unwrap();
    let ct_b = scheme::encrypt(&ctx, &sk, &pt, &mut rng).unwrap();

    settings.bench_with_input(
        BenchmarkId::new("multiply_relinearize", "n_4096_logq_27_28_28"),
        &(ctx, ct_a, ct_b, rlk),
        |benchmark, (ctx, ct_a, ct_b, rlk)| {
            benchmark.iter(|| {
                let product = scheme::mul_assign(ctx, ct_a, ct_b).unwrap();
                relinearize(ctx, &product, rlk).unwrap()
            })
        },
    );
}

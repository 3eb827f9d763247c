//! End-to-end scenarios exercising a named parameter set rather than the
//! small ad-hoc contexts the unit tests use.
//!
//! No SIMD/CRT slot encoder is implemented (out of scope, see SPEC_FULL.md
//! §1 Non-goals), so "multiply" and "rotate" here operate on raw `Coeff`-form
//! plaintexts: multiplication is the ring product mod `X^N+1`, and rotation
//! is checked by shape/noise-budget rather than by slot position.

use bfv_core::bfv::scheme;
use bfv_core::bfv::{Context, ParameterSet, Plaintext};
use bfv_core::keyswitch::{generate_relinearization_key, relinearize, GaloisKey, SecretKey};
use bfv_core::poly::Coeff;

fn named_context() -> Context {
    Context::new(ParameterSet::named("n_4096_logq_27_28_28_logt_5").unwrap()).unwrap()
}

/// S4: encrypt a random coefficient vector, modulus-switch down to a single
/// modulus, decrypt, and check the message survives exactly.
#[test]
fn encrypt_mod_switch_decrypt_round_trip() {
    let ctx = named_context();
    let mut rng = rand::thread_rng();
    let sk = SecretKey::generate(&ctx, &mut rng).unwrap();

    let t = ctx.plaintext_modulus().value();
    let values: Vec<u64> = (0..ctx.degree()).map(|i| (i as u64 * 7 + 3) % t).collect();
    let pt = Plaintext::<Coeff>::new(&ctx, values.clone()).unwrap();

    let ct = scheme::encrypt(&ctx, &sk, &pt, &mut rng).unwrap();
    let switched = scheme::mod_switch_down_to_single(&ct).unwrap();
    assert_eq!(switched.context().moduli_count(), 1);

    let decrypted = scheme::decrypt_coeff(&ctx, &switched, &sk).unwrap();
    assert_eq!(decrypted.as_slice(), &values[..]);
}

/// S5 (adapted): ciphertext-multiply two single-term plaintexts, relinearize,
/// decrypt, and check the product matches plain ring multiplication mod `t`.
#[test]
fn multiply_relinearize_matches_ring_product() {
    let ctx = named_context();
    let mut rng = rand::thread_rng();
    let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
    let rlk = generate_relinearization_key(&ctx, &sk, &mut rng).unwrap();

    let t = ctx.plaintext_modulus().value();
    let mut a_values = vec![0u64; ctx.degree()];
    a_values[0] = 6;
    let mut b_values = vec![0u64; ctx.degree()];
    b_values[1] = 4; // 6 * 4*X = 24*X

    let pt_a = Plaintext::<Coeff>::new(&ctx, a_values).unwrap();
    let pt_b = Plaintext::<Coeff>::new(&ctx, b_values).unwrap();
    let ct_a = scheme::encrypt(&ctx, &sk, &pt_a, &mut rng).unwrap();
    let ct_b = scheme::encrypt(&ctx, &sk, &pt_b, &mut rng).unwrap();

    let product = scheme::mul_assign(&ctx, &ct_a, &ct_b).unwrap();
    let relinearized = relinearize(&ctx, &product, &rlk).unwrap();
    assert_eq!(relinearized.poly_count(), 2);

    let decrypted = scheme::decrypt_coeff(&ctx, &relinearized, &sk).unwrap();
    let mut expected = vec![0u64; ctx.degree()];
    expected[1] = (6 * 4) % t;
    assert_eq!(decrypted.as_slice(), &expected[..]);
}

/// S6 (adapted): a column rotation by a supported power-of-two step key
/// switches cleanly and leaves a positive noise budget; without a slot
/// encoder the resulting coefficient arrangement isn't independently
/// checkable, so this asserts the operation is well-formed end to end.
#[test]
fn rotate_columns_preserves_decryptability() {
    let ctx = named_context();
    let mut rng = rand::thread_rng();
    let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
    let gk = GaloisKey::generate(&ctx, &sk, &mut rng).unwrap();

    let mut values = vec![0u64; ctx.degree()];
    values[0] = 9;
    let pt = Plaintext::<Coeff>::new(&ctx, values).unwrap();
    let ct = scheme::encrypt(&ctx, &sk, &pt, &mut rng).unwrap();

    let rotated = bfv_core::keyswitch::rotate_columns(&ctx, &ct, 1, &gk).unwrap();
    let budget = scheme::noise_budget_eval(&ctx, &rotated, &sk).unwrap();
    assert!(budget > 0.0);
}

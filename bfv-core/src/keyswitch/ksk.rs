//! Hybrid RNS key switching (§4.8): one digit per ciphertext modulus,
//! numerically stabilized by a single special modulus `P` appended to the
//! key-switching chain.
//!
//! Grounded in the same CRT-decomposition key switching the BEHZ
//! multiplication pipeline already uses for base extension
//! ([`crate::rns::tool::RnsTool`]): a polynomial `c2` over `Q` is split into
//! `k` single-modulus digits, each lifted back to the full chain and
//! combined with a digit-specific key-switching key, so no big-integer CRT
//! composition is needed at switching time — only per-row scalar
//! arithmetic, the same style `RnsTool::q_hat_mod_mtilde` already uses.

use rand::RngCore;

use crate::bfv::context::Context;
use crate::error::{HeError, Result};
use crate::keyswitch::secret_key::SecretKey;
use crate::modulus::Modulus;
use crate::poly::{Coeff, Eval, PolyRq};
use crate::prng::samplers::sample_centered_binomial;

/// One key-switching key: a digit-indexed list of fresh `Eval`-form
/// encryptions (under `to_key`) of `P * hat_i(Q) * from_key`, bound to the
/// key-switching chain `Q ∪ {P}`.
#[derive(Clone, Debug)]
pub struct KeySwitchKey {
    digits: Vec<PolyRq<Eval>>,
    c1_digits: Vec<PolyRq<Eval>>,
}

fn signed_to_residue(v: i64, qi: &Modulus) -> u64 {
    v.rem_euclid(qi.value() as i64) as u64
}

/// Generates a key-switching key from `from_key` to `to_key`: one digit per
/// modulus of `context`'s ciphertext chain.
#[tracing::instrument(skip_all)]
pub fn generate_key_switch_key(context: &Context, from_key: &SecretKey, to_key: &SecretKey, rng: &mut impl RngCore) -> Result<KeySwitchKey> {
    let ks_context = context.key_switch_context();
    let q_moduli = context.ciphertext_context().moduli().to_vec();
    let k = q_moduli.len();
    let p = context.special_modulus();
    tracing::debug!(digits = k, "generating key-switching key");

    let mut digits = Vec::with_capacity(k);
    let mut c1_digits = Vec::with_capacity(k);

    for i in 0..k {
        // hat_i mod q_l = prod_{m != i} q_m mod q_l, for every row l of Q.
        let mut row_scalars = vec![0u64; k + 1];
        for (l, ql) in q_moduli.iter().enumerate() {
            let hat_i_mod_ql = q_moduli
                .iter()
                .enumerate()
                .filter(|&(m, _)| m != i)
                .fold(1u64 % ql.value(), |acc, (_, qm)| ql.mul_mod_vt(acc, qm.value() % ql.value()));
            row_scalars[l] = ql.mul_mod_vt(p.value() % ql.value(), hat_i_mod_ql);
        }
        row_scalars[k] = 0; // the P row carries no plaintext contribution, see module docs.

        let mut plaintext = from_key.as_eval_ext().clone();
        plaintext.mul_row_scalars_assign(&row_scalars);

        let mut seed = [0u8; 16];
        rng.fill_bytes(&mut seed);
        let mut public_rng = crate::prng::CtrDrbg::from_seed(seed);
        let a = PolyRq::<Eval>::random(ks_context, &mut public_rng).with_variable_time();

        let error = sample_centered_binomial(ks_context.degree(), context.params().error_std_dev(), rng);
        let n = ks_context.degree();
        let mut e_coeffs = vec![0u64; ks_context.moduli_count() * n];
        for (row, qi) in ks_context.moduli().iter().enumerate() {
            for (j, &v) in error.iter().enumerate() {
                e_coeffs[row * n + j] = signed_to_residue(v, qi);
            }
        }
        let e_eval = PolyRq::<Coeff>::from_coeffs(ks_context, e_coeffs).forward_ntt();

        let mut c0 = a.clone();
        c0.mul_assign(to_key.as_eval_ext())?;
        let mut c0 = c0.neg();
        c0.add_assign(&e_eval)?;
        c0.add_assign(&plaintext)?;

        digits.push(c0);
        c1_digits.push(a);
    }

    Ok(KeySwitchKey { digits, c1_digits })
}

/// Switches `c2` (a `Coeff`-form polynomial over `context`'s full ciphertext
/// chain) from the key `ksk` was generated `from_key` to its `to_key`,
/// returning the `(c0, c1)` delta to add into the ciphertext being
/// relinearized, rotated, or otherwise key-switched.
pub fn compute_key_switching_update(context: &Context, c2: &PolyRq<Coeff>, ksk: &KeySwitchKey) -> Result<(PolyRq<Coeff>, PolyRq<Coeff>)> {
    let ks_context = context.key_switch_context();
    let q_moduli = context.ciphertext_context().moduli().to_vec();
    let k = q_moduli.len();
    if ksk.digits.len() != k {
        return Err(HeError::InvalidCiphertext("key-switching key digit count does not match the ciphertext modulus chain"));
    }

    let n = context.degree();

    let mut acc_c0: Option<PolyRq<Eval>> = None;
    let mut acc_c1: Option<PolyRq<Eval>> = None;

    for i in 0..k {
        let qi = q_moduli[i];
        let hat_i_mod_qi = q_moduli
            .iter()
            .enumerate()
            .filter(|&(m, _)| m != i)
            .fold(1u64 % qi.value(), |acc, (_, qm)| qi.mul_mod_vt(acc, qm.value() % qi.value()));
        let w_i = qi.inverse_mod(hat_i_mod_qi)?;

        let row_i = c2.row(i);
        let mut lifted = vec![0u64; ks_context.moduli_count() * n];
        for (l, ql) in ks_context.moduli().iter().enumerate() {
            for j in 0..n {
                let t_ij = qi.mul_mod_vt(row_i[j], w_i);
                lifted[l * n + j] = t_ij % ql.value();
            }
        }
        let lifted_eval = PolyRq::<Coeff>::from_coeffs(ks_context, lifted).forward_ntt();

        let mut term0 = lifted_eval.clone();
        term0.mul_assign(&ksk.digits[i])?;
        let mut term1 = lifted_eval;
        term1.mul_assign(&ksk.c1_digits[i])?;

        acc_c0 = Some(match acc_c0 {
            None => term0,
            Some(mut running) => {
                running.add_assign(&term0)?;
                running
            }
        });
        acc_c1 = Some(match acc_c1 {
            None => term1,
            Some(mut running) => {
                running.add_assign(&term1)?;
                running
            }
        });
    }

    let c0_coeff = acc_c0.expect("checked k > 0 above").inverse_ntt();
    let c1_coeff = acc_c1.expect("checked k > 0 above").inverse_ntt();
    Ok((c0_coeff.divide_and_round_q_last(), c1_coeff.divide_and_round_q_last()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bfv::params::{ParameterSet, SecurityLevel};
    use crate::bfv::scheme;

    fn test_context() -> Context {
        Context::new(ParameterSet {
            degree: 64,
            plaintext_modulus: 17,
            coefficient_moduli_bits: vec![30, 30, 30],
            error_std_dev_milli: 3200,
            security_level: SecurityLevel::Classical128,
        })
        .unwrap()
    }

    #[test]
    fn key_switch_to_self_preserves_decryption() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();

        let ksk = generate_key_switch_key(&ctx, &sk, &sk, &mut rng).unwrap();

        let ct = scheme::encrypt_zero(&ctx, &sk, &mut rng).unwrap();
        let (d0, d1) = compute_key_switching_update(&ctx, &ct.polys()[1], &ksk).unwrap();

        let mut new_c0 = ct.polys()[0].clone();
        new_c0.add_assign(&d0).unwrap();

        let switched = crate::bfv::ciphertext::Ciphertext::new(ctx.ciphertext_context().clone(), vec![new_c0, d1], 1, None).unwrap();
        let budget = scheme::noise_budget_eval(&ctx, &switched, &sk).unwrap();
        assert!(budget > 0.0);
    }
}

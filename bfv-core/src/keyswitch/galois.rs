//! Galois automorphisms and the rotation/row-swap primitives built on top of
//! them (§4.8). `X -> X^element` commutes with encryption (`apply_galois` on
//! the raw ciphertext), but moves the decrypting key from `s` to
//! `sigma_element(s)`; a [`GaloisKey`] key-switches back to `s` so the
//! result is decryptable under the original secret.

use std::collections::HashMap;

use rand::RngCore;

use crate::bfv::ciphertext::Ciphertext;
use crate::bfv::context::Context;
use crate::error::{HeError, Result};
use crate::keyswitch::ksk::{compute_key_switching_update, generate_key_switch_key, KeySwitchKey};
use crate::keyswitch::secret_key::SecretKey;
use crate::poly::Coeff;

/// The Galois element that swaps a BFV plaintext's two batching "rows":
/// `X -> X^(2N-1)`, i.e. `X -> X^-1`.
pub fn row_swap_element(degree: usize) -> u64 {
    (2 * degree as u64) - 1
}

/// The Galois element for rotating one batching row by `step` columns:
/// `X -> X^(3^step mod 2N)`. Negative `step` rotates the other way.
pub fn column_rotation_element(degree: usize, step: i64) -> u64 {
    let two_n = 2 * degree as u64;
    let half = (degree / 2) as i64;
    let normalized = step.rem_euclid(half.max(1) as i64);
    mod_pow(3, normalized as u64, two_n)
}

fn mod_pow(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut result = 1u64 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result as u128 * base as u128 % modulus as u128) as u64;
        }
        base = (base as u128 * base as u128 % modulus as u128) as u64;
        exp >>= 1;
    }
    result
}

/// A set of key-switching keys, one per supported Galois element, each
/// switching from `sigma_element(s)` back to `s`.
#[derive(Clone, Debug, Default)]
pub struct GaloisKey {
    keys: HashMap<u64, KeySwitchKey>,
}

impl GaloisKey {
    /// Generates a `GaloisKey` supporting row-swap plus every power-of-two
    /// column rotation step (`+-1, +-2, +-4, ...`), the standard baby-step
    /// basis [`rotate_columns_multi_step`] composes arbitrary shifts from.
    pub fn generate(context: &Context, sk: &SecretKey, rng: &mut impl RngCore) -> Result<Self> {
        let degree = context.degree();
        let half = (degree / 2).max(1);

        let mut elements = vec![row_swap_element(degree)];
        let mut step = 1i64;
        while step < half as i64 {
            elements.push(column_rotation_element(degree, step));
            elements.push(column_rotation_element(degree, -step));
            step *= 2;
        }
        elements.sort_unstable();
        elements.dedup();

        Self::generate_for_elements(context, sk, &elements, rng)
    }

    /// Generates a `GaloisKey` for exactly the given elements.
    pub fn generate_for_elements(context: &Context, sk: &SecretKey, elements: &[u64], rng: &mut impl RngCore) -> Result<Self> {
        let mut keys = HashMap::with_capacity(elements.len());
        for &element in elements {
            let sigma_s = sk.apply_galois(element);
            keys.insert(element, generate_key_switch_key(context, &sigma_s, sk, rng)?);
        }
        Ok(Self { keys })
    }

    pub fn has(&self, element: u64) -> bool {
        self.keys.contains_key(&element)
    }

    fn get(&self, element: u64) -> Result<&KeySwitchKey> {
        self.keys.get(&element).ok_or(HeError::MissingGaloisElement(element))
    }
}

/// Applies the Galois automorphism for `element` to `ct`, then key-switches
/// the result back onto `s` using `galois_key`. `ct` must be a
/// 2-polynomial (relinearized) ciphertext.
pub fn apply_galois(context: &Context, ct: &Ciphertext<Coeff>, element: u64, galois_key: &GaloisKey) -> Result<Ciphertext<Coeff>> {
    if ct.poly_count() != 2 {
        return Err(HeError::InvalidCiphertext("apply_galois requires a relinearized 2-polynomial ciphertext"));
    }
    if ct.correction_factor() != 1 {
        return Err(HeError::InvalidCorrectionFactor(ct.correction_factor()));
    }
    if galois_key.keys.is_empty() {
        return Err(HeError::MissingGaloisKey);
    }
    let ksk = galois_key.get(element)?;

    let c0g = ct.polys()[0].apply_galois(element);
    let c1g = ct.polys()[1].apply_galois(element);

    let (d0, d1) = compute_key_switching_update(context, &c1g, ksk)?;
    let mut new_c0 = c0g;
    new_c0.add_assign(&d0)?;

    Ciphertext::new(context.ciphertext_context().clone(), vec![new_c0, d1], ct.correction_factor(), None)
}

/// Swaps the two batching rows of `ct`.
pub fn swap_rows(context: &Context, ct: &Ciphertext<Coeff>, galois_key: &GaloisKey) -> Result<Ciphertext<Coeff>> {
    apply_galois(context, ct, row_swap_element(context.degree()), galois_key)
}

/// Rotates one batching row of `ct` by a single step, using a directly
/// available Galois key. Prefer [`rotate_columns_multi_step`] for arbitrary
/// step counts.
pub fn rotate_columns(context: &Context, ct: &Ciphertext<Coeff>, step: i64, galois_key: &GaloisKey) -> Result<Ciphertext<Coeff>> {
    apply_galois(context, ct, column_rotation_element(context.degree(), step), galois_key)
}

/// Rotates one batching row of `ct` by an arbitrary step count, decomposing
/// it into the power-of-two steps [`GaloisKey::generate`] provisions
/// (`+-1, +-2, +-4, ...`) and applying each as a separate key switch.
///
/// This costs one key switch per set bit of `step` rather than one, but
/// needs only `O(log N)` stored Galois keys instead of one per possible
/// step — the same trade-off SEAL's `GaloisKeys::Create(steps)` makes when
/// asked for a power-of-two-only key set.
pub fn rotate_columns_multi_step(context: &Context, ct: &Ciphertext<Coeff>, step: i64, galois_key: &GaloisKey) -> Result<Ciphertext<Coeff>> {
    let degree = context.degree();
    let half = (degree / 2).max(1) as i64;
    let mut remaining = step.rem_euclid(half);
    if remaining == 0 {
        return Ok(ct.clone());
    }

    let mut current = ct.clone();
    let mut magnitude = 1i64;
    while remaining != 0 {
        let bit = remaining & 1 != 0;
        if bit {
            let element = column_rotation_element(degree, magnitude);
            if !galois_key.has(element) {
                return Err(HeError::InvalidRotationStep(step));
            }
            current = apply_galois(context, &current, element, galois_key)?;
        }
        remaining >>= 1;
        magnitude *= 2;
    }
    Ok(current)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bfv::params::{ParameterSet, SecurityLevel};
    use crate::bfv::plaintext::Plaintext;
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
    fn row_swap_is_an_involution_on_elements() {
        let degree = 64;
        let e = row_swap_element(degree);
        assert_eq!(mod_pow(e, 2, 2 * degree as u64), 1);
    }

    #[test]
    fn apply_galois_identity_element_recovers_plaintext() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
        let gk = GaloisKey::generate_for_elements(&ctx, &sk, &[1], &mut rng).unwrap();

        let mut values = vec![0u64; ctx.degree()];
        values[0] = 9;
        let pt = Plaintext::<Coeff>::new(&ctx, values.clone()).unwrap();
        let ct = scheme::encrypt(&ctx, &sk, &pt, &mut rng).unwrap();

        let rotated = apply_galois(&ctx, &ct, 1, &gk).unwrap();
        let decrypted = scheme::decrypt_coeff(&ctx, &rotated, &sk).unwrap();
        assert_eq!(decrypted.as_slice(), &values[..]);
    }

    #[test]
    fn missing_element_errors() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
        let gk = GaloisKey::generate_for_elements(&ctx, &sk, &[1], &mut rng).unwrap();
        let ct = scheme::encrypt_zero(&ctx, &sk, &mut rng).unwrap();
        assert!(rotate_columns(&ctx, &ct, 1, &gk).is_err());
    }
}

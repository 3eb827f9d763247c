//! The BFV secret key: a ternary polynomial carried in `Eval` form (every
//! ciphertext operation that consumes it needs a pointwise product), with
//! zeroize-on-drop per §5's "every secret-derived buffer is zeroized before
//! release to the allocator" resource-lifecycle invariant.
//!
//! A secret key is kept in two parallel representations: [`SecretKey::as_eval`]
//! bound to the plain ciphertext chain `Q`, and [`SecretKey::as_eval_ext`]
//! bound to the key-switching chain `Q ∪ {special modulus}`. Since the
//! underlying coefficients are ternary (`{-1, 0, 1}`), reducing them into the
//! extra special-modulus row is an exact CRT lift, not an approximation —
//! unlike a general `Q`-sized ciphertext polynomial, a small secret extends
//! to extra moduli for free. Key-switching-key generation (`ksk.rs`) needs
//! the extended form; every other consumer uses the plain one.

use rand::RngCore;

use crate::bfv::context::Context;
use crate::error::Result;
use crate::poly::{Eval, PolyRq};
use crate::poly_context::PolyContext;
use crate::prng::samplers::sample_ternary;

/// A ternary secret key, stored forward-NTT'd in both the plain and
/// key-switching-extended moduli chains. Dropping a `SecretKey` zeroizes
/// both.
#[derive(Clone, Debug)]
pub struct SecretKey {
    s_eval: PolyRq<Eval>,
    s_eval_ext: PolyRq<Eval>,
}

impl SecretKey {
    /// Samples a fresh ternary secret (each coefficient independently in
    /// `{-1, 0, 1}`) and forward-NTTs it into both the plain and
    /// key-switching-extended moduli chains.
    pub fn generate(context: &Context, rng: &mut impl RngCore) -> Result<Self> {
        let ciphertext_context = context.ciphertext_context();
        let key_switch_context = context.key_switch_context();
        let ternary = sample_ternary(ciphertext_context.degree(), rng);

        Ok(Self {
            s_eval: build_ternary(ciphertext_context, &ternary),
            s_eval_ext: build_ternary(key_switch_context, &ternary),
        })
    }

    /// Builds a `SecretKey` directly from already-NTT'd polynomials, e.g.
    /// `s^2` when deriving a relinearization key's target, or `sigma(s)`
    /// when deriving a Galois key's target.
    pub fn from_eval(s_eval: PolyRq<Eval>, s_eval_ext: PolyRq<Eval>) -> Self {
        Self { s_eval, s_eval_ext }
    }

    #[inline]
    pub fn as_eval(&self) -> &PolyRq<Eval> {
        &self.s_eval
    }

    /// The same secret, bound to the key-switching chain `Q ∪ {special
    /// modulus}` instead of just `Q`.
    #[inline]
    pub fn as_eval_ext(&self) -> &PolyRq<Eval> {
        &self.s_eval_ext
    }

    /// `s * s`, forward-NTT'd, wrapped as a `SecretKey` — the target of the
    /// relinearization key (§4.8 `generate_relinearization_key`).
    pub fn squared(&self) -> Result<SecretKey> {
        let mut s2 = self.s_eval.clone();
        s2.mul_assign(&self.s_eval)?;
        let mut s2_ext = self.s_eval_ext.clone();
        s2_ext.mul_assign(&self.s_eval_ext)?;
        Ok(SecretKey { s_eval: s2, s_eval_ext: s2_ext })
    }

    /// `sigma_element(s)`, the Galois-automorphed secret a rotation or
    /// Frobenius key switches from.
    pub fn apply_galois(&self, element: u64) -> SecretKey {
        SecretKey {
            s_eval: self.s_eval.apply_galois(element),
            s_eval_ext: self.s_eval_ext.apply_galois(element),
        }
    }

    /// Noise bits remaining in `ct` before decryption becomes unreliable.
    /// Variable-time in the ciphertext and the secret key; callers should not
    /// expose this on attacker-influenced ciphertexts (see
    /// [`crate::bfv::scheme::noise_budget_eval`], which this delegates to).
    pub fn measure_noise(&self, context: &Context, ct: &crate::bfv::ciphertext::Ciphertext<crate::poly::Coeff>) -> Result<f64> {
        crate::bfv::scheme::noise_budget_eval(context, ct, self)
    }
}

fn build_ternary(poly_context: &PolyContext, ternary: &[i8]) -> PolyRq<Eval> {
    let n = poly_context.degree();
    let mut coeffs = vec![0u64; poly_context.moduli_count() * n];
    for (row, qi) in poly_context.moduli().iter().enumerate() {
        for (j, &v) in ternary.iter().enumerate() {
            coeffs[row * n + j] = match v {
                1 => 1,
                -1 => qi.value() - 1,
                _ => 0,
            };
        }
    }
    PolyRq::from_coeffs(poly_context, coeffs).forward_ntt()
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.s_eval.zeroize();
        self.s_eval_ext.zeroize();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bfv::params::{ParameterSet, SecurityLevel};

    fn test_context() -> Context {
        Context::new(ParameterSet {
            degree: 8,
            plaintext_modulus: 17,
            coefficient_moduli_bits: vec![20, 20],
            error_std_dev_milli: 3200,
            security_level: SecurityLevel::Classical128,
        })
        .unwrap()
    }

    #[test]
    fn generate_produces_eval_form_key() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
        assert_eq!(sk.as_eval().moduli_count(), ctx.moduli_count());
    }

    #[test]
    fn squared_key_has_same_context() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
        let s2 = sk.squared().unwrap();
        assert_eq!(s2.as_eval().context(), sk.as_eval().context());
    }

    #[test]
    fn extended_key_has_one_extra_modulus() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
        assert_eq!(sk.as_eval_ext().moduli_count(), ctx.moduli_count() + 1);
    }
}

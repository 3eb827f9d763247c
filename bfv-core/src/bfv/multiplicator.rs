//! [`BfvMultiplicator`]: a convenience wrapper bundling ciphertext
//! multiplication with optional relinearization and modulus switching, so
//! callers don't have to chain [`crate::bfv::scheme::mul_assign`],
//! [`crate::keyswitch::relin::relinearize`], and
//! [`crate::bfv::scheme::mod_switch_down`] by hand at every call site.
//!
//! Grounded on the teacher-adjacent `Multiplicator` pattern (parameterized
//! strategy object wrapping extend/multiply/scale/relinearize/mod-switch),
//! simplified to this crate's non-leveled, fixed-scaling-factor BEHZ
//! pipeline: there's one extended basis (`Q ∪ B_sk`) and one down-scaling
//! (by `t`), so the only remaining choices are whether to relinearize and
//! whether to modulus-switch down afterward.

use crate::bfv::ciphertext::Ciphertext;
use crate::bfv::context::Context;
use crate::bfv::scheme;
use crate::error::Result;
use crate::keyswitch::ksk::KeySwitchKey;
use crate::poly::Coeff;

/// Bundles a multiplication strategy: always does the BEHZ cross-multiply
/// and rescale, then optionally relinearizes and/or modulus-switches down
/// one level.
pub struct BfvMultiplicator<'a> {
    context: &'a Context,
    relinearization_key: Option<&'a KeySwitchKey>,
    mod_switch_after: bool,
}

impl<'a> BfvMultiplicator<'a> {
    /// A multiplicator that leaves the product unrelinearized (3
    /// polynomials) and at the same modulus chain.
    pub fn new(context: &'a Context) -> Self {
        Self {
            context,
            relinearization_key: None,
            mod_switch_after: false,
        }
    }

    /// The usual strategy: multiply, then immediately relinearize back down
    /// to 2 polynomials using `rlk`.
    pub fn with_relinearization(context: &'a Context, rlk: &'a KeySwitchKey) -> Self {
        Self {
            context,
            relinearization_key: Some(rlk),
            mod_switch_after: false,
        }
    }

    /// Enables relinearization on an already-constructed multiplicator.
    pub fn enable_relinearization(&mut self, rlk: &'a KeySwitchKey) {
        self.relinearization_key = Some(rlk);
    }

    /// Enables a modulus switch down one level after multiplying (and
    /// relinearizing, if enabled). Requires relinearization, since modulus
    /// switching a 3-polynomial ciphertext isn't supported.
    pub fn enable_mod_switching(&mut self) {
        self.mod_switch_after = true;
    }

    /// Multiplies `lhs` by `rhs` according to the configured strategy.
    pub fn multiply(&self, lhs: &Ciphertext<Coeff>, rhs: &Ciphertext<Coeff>) -> Result<Ciphertext<Coeff>> {
        let product = scheme::mul_assign(self.context, lhs, rhs)?;

        let product = match self.relinearization_key {
            Some(rlk) => crate::keyswitch::relin::relinearize(self.context, &product, rlk)?,
            None => product,
        };

        if self.mod_switch_after {
            scheme::mod_switch_down(&product)
        } else {
            Ok(product)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bfv::params::{ParameterSet, SecurityLevel};
    use crate::bfv::plaintext::Plaintext;
    use crate::keyswitch::relin::generate_relinearization_key;
    use crate::keyswitch::secret_key::SecretKey;

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
    fn relinearizing_multiplicator_produces_two_polynomial_ciphertext() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();
        let rlk = generate_relinearization_key(&ctx, &sk, &mut rng).unwrap();

        let mut a_values = vec![0u64; ctx.degree()];
        a_values[0] = 4;
        let mut b_values = vec![0u64; ctx.degree()];
        b_values[0] = 5;
        let pt_a = Plaintext::<Coeff>::new(&ctx, a_values).unwrap();
        let pt_b = Plaintext::<Coeff>::new(&ctx, b_values).unwrap();
        let ct_a = scheme::encrypt(&ctx, &sk, &pt_a, &mut rng).unwrap();
        let ct_b = scheme::encrypt(&ctx, &sk, &pt_b, &mut rng).unwrap();

        let multiplicator = BfvMultiplicator::with_relinearization(&ctx, &rlk);
        let product = multiplicator.multiply(&ct_a, &ct_b).unwrap();
        assert_eq!(product.poly_count(), 2);

        let decrypted = scheme::decrypt_coeff(&ctx, &product, &sk).unwrap();
        assert_eq!(decrypted.as_slice()[0], 3); // 4*5 = 20 = 3 mod 17
    }

    #[test]
    fn bare_multiplicator_leaves_product_unrelinearized() {
        let ctx = test_context();
        let mut rng = rand::thread_rng();
        let sk = SecretKey::generate(&ctx, &mut rng).unwrap();

        let mut a_values = vec![0u64; ctx.degree()];
        a_values[0] = 2;
        let pt_a = Plaintext::<Coeff>::new(&ctx, a_values.clone()).unwrap();
        let ct_a = scheme::encrypt(&ctx, &sk, &pt_a, &mut rng).unwrap();
        let ct_b = scheme::encrypt(&ctx, &sk, &pt_a, &mut rng).unwrap();

        let multiplicator = BfvMultiplicator::new(&ctx);
        let product = multiplicator.multiply(&ct_a, &ct_b).unwrap();
        assert_eq!(product.poly_count(), 3);
    }
}

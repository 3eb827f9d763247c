//! Encoded plaintexts bound to a [`Context`]'s ciphertext modulus chain.
//!
//! `Plaintext<Coeff>` holds the `N` raw message coefficients in `[0, t)`,
//! exactly as an external encoder (SIMD or identity — out of scope here per
//! §6) produced them; `plaintext_translate` consumes this form directly.
//! `Plaintext<Eval>` holds the same message lifted into every ciphertext
//! modulus (`m mod q_i`, valid since `m < t < q_i`) and forward-NTT'd per
//! row, so it can be multiplied pointwise against an `Eval`-form ciphertext
//! poly without the scale-and-round `plaintext_translate` path.

use std::marker::PhantomData;

use crate::bfv::context::Context;
use crate::error::{HeError, Result};
use crate::poly::{Coeff, Eval, PolyForm};
use crate::poly_context::PolyContext;

#[derive(Clone, Debug)]
pub struct Plaintext<F: PolyForm> {
    context: PolyContext,
    values: Vec<u64>,
    _form: PhantomData<F>,
}

impl<F: PolyForm> Plaintext<F> {
    #[inline]
    pub fn context(&self) -> &PolyContext {
        &self.context
    }

    #[inline]
    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }
}

impl Plaintext<Coeff> {
    /// Wraps `values` (one coefficient per ring position, each `< t`) as a
    /// `Coeff`-form plaintext bound to `context`'s ciphertext chain.
    pub fn new(context: &Context, values: Vec<u64>) -> Result<Self> {
        if values.len() != context.degree() {
            return Err(HeError::IncompatibleCiphertextAndPlaintext);
        }
        let t = context.plaintext_modulus().value();
        if values.iter().any(|&v| v >= t) {
            return Err(HeError::EncodingDataOutOfBounds);
        }
        Ok(Self {
            context: context.ciphertext_context().clone(),
            values,
            _form: PhantomData,
        })
    }

    /// Lifts this plaintext into the ciphertext's RNS base, one row per
    /// modulus (`m mod q_i`), and forward-NTTs each row, for pointwise
    /// `Eval`-form multiplication against a ciphertext.
    pub fn to_eval(&self, context: &Context) -> Plaintext<Eval> {
        let n = self.context.degree();
        let moduli = self.context.moduli();
        let mut lifted = vec![0u64; moduli.len() * n];
        for (i, qi) in moduli.iter().enumerate() {
            for j in 0..n {
                lifted[i * n + j] = self.values[j] % qi.value();
            }
        }
        for (i, table) in self.context.ntt_tables().iter().enumerate() {
            table.forward_inplace(&mut lifted[i * n..(i + 1) * n]);
        }
        let _ = context;
        Plaintext {
            context: self.context.clone(),
            values: lifted,
            _form: PhantomData,
        }
    }
}

impl Plaintext<Eval> {
    #[inline]
    pub fn moduli_count(&self) -> usize {
        self.context.moduli_count()
    }

    /// Wraps the already-NTT'd values as a plain [`PolyRq<Eval>`], for
    /// pointwise multiplication against a ciphertext polynomial.
    pub fn as_poly(&self) -> crate::poly::PolyRq<Eval> {
        crate::poly::PolyRq::from_coeffs(&self.context, self.values.clone())
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
    fn rejects_out_of_range_coefficients() {
        let ctx = test_context();
        let values = vec![20u64; 8];
        assert!(Plaintext::<Coeff>::new(&ctx, values).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        let ctx = test_context();
        assert!(Plaintext::<Coeff>::new(&ctx, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn to_eval_lifts_every_row() {
        let ctx = test_context();
        let mut values = vec![0u64; 8];
        values[0] = 5;
        let pt = Plaintext::<Coeff>::new(&ctx, values).unwrap();
        let eval = pt.to_eval(&ctx);
        assert_eq!(eval.moduli_count(), ctx.moduli_count());
    }
}

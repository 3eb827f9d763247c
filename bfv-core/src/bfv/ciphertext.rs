//! BFV ciphertexts: a fixed-order tuple of [`PolyRq`] polynomials sharing one
//! [`PolyContext`], a correction factor tracking plaintext-scale drift across
//! Galois/mod-switch operations, and an optional seed that lets the second
//! polynomial of a fresh encryption be regenerated instead of stored (§6,
//! §3.1 "Seeded ciphertext regeneration").

use crate::error::{HeError, Result};
use crate::poly::{Coeff, Eval, PolyForm, PolyRq};
use crate::poly_context::PolyContext;

#[derive(Clone, Debug)]
pub struct Ciphertext<F: PolyForm> {
    context: PolyContext,
    polys: Vec<PolyRq<F>>,
    correction_factor: u64,
    /// The 128-bit seed a fresh `encrypt_zero` used to derive its public `a`
    /// polynomial, if this ciphertext hasn't been modified since. Cleared by
    /// any operation that invalidates the `a` = poly[1] relationship to the
    /// seed (add/sub/neg, Galois, relinearize, mod-switch).
    seed: Option<[u8; 16]>,
}

impl<F: PolyForm> Ciphertext<F> {
    pub fn new(context: PolyContext, polys: Vec<PolyRq<F>>, correction_factor: u64, seed: Option<[u8; 16]>) -> Result<Self> {
        if polys.is_empty() {
            return Err(HeError::InvalidCiphertext("ciphertext must have at least one polynomial"));
        }
        for p in &polys {
            if p.context() != &context {
                return Err(HeError::InvalidContext);
            }
        }
        Ok(Self {
            context,
            polys,
            correction_factor,
            seed,
        })
    }

    /// An all-zero ciphertext of `poly_count` polynomials over `context`.
    /// `is_transparent` for any `poly_count`, since every polynomial is zero.
    pub fn zero_ciphertext(context: &PolyContext, poly_count: usize) -> Self {
        Self {
            context: context.clone(),
            polys: (0..poly_count).map(|_| PolyRq::zero(context)).collect(),
            correction_factor: 1,
            seed: None,
        }
    }

    #[inline]
    pub fn context(&self) -> &PolyContext {
        &self.context
    }

    #[inline]
    pub fn polys(&self) -> &[PolyRq<F>] {
        &self.polys
    }

    #[inline]
    pub fn polys_mut(&mut self) -> &mut [PolyRq<F>] {
        &mut self.polys
    }

    pub fn into_polys(self) -> Vec<PolyRq<F>> {
        self.polys
    }

    #[inline]
    pub fn poly_count(&self) -> usize {
        self.polys.len()
    }

    #[inline]
    pub fn correction_factor(&self) -> u64 {
        self.correction_factor
    }

    pub fn set_correction_factor(&mut self, value: u64) {
        self.correction_factor = value;
    }

    #[inline]
    pub fn seed(&self) -> Option<[u8; 16]> {
        self.seed
    }

    pub(crate) fn clear_seed(&mut self) {
        self.seed = None;
    }

    fn check_same_context(&self, other: &Self) -> Result<()> {
        if self.context != other.context {
            return Err(HeError::InvalidContext);
        }
        if self.polys.len() != other.polys.len() {
            return Err(HeError::InvalidCiphertext("ciphertexts must have the same number of polynomials"));
        }
        Ok(())
    }

    /// Pointwise ciphertext addition. Requires matching contexts, poly
    /// counts, and correction factors.
    pub fn add_assign(&mut self, rhs: &Self) -> Result<()> {
        self.check_same_context(rhs)?;
        if self.correction_factor != rhs.correction_factor {
            return Err(HeError::InvalidCorrectionFactor(rhs.correction_factor));
        }
        for (a, b) in self.polys.iter_mut().zip(rhs.polys.iter()) {
            a.add_assign(b)?;
        }
        self.clear_seed();
        Ok(())
    }

    /// Pointwise ciphertext subtraction. Requires matching contexts, poly
    /// counts, and correction factors.
    pub fn sub_assign(&mut self, rhs: &Self) -> Result<()> {
        self.check_same_context(rhs)?;
        if self.correction_factor != rhs.correction_factor {
            return Err(HeError::InvalidCorrectionFactor(rhs.correction_factor));
        }
        for (a, b) in self.polys.iter_mut().zip(rhs.polys.iter()) {
            a.sub_assign(b)?;
        }
        self.clear_seed();
        Ok(())
    }

    /// Negates every polynomial in place.
    pub fn neg_assign(&mut self) {
        for p in self.polys.iter_mut() {
            *p = p.neg();
        }
        self.clear_seed();
    }

    /// Whether this ciphertext is transparent: every polynomial but the
    /// first is zero, meaning the plaintext is recoverable without the
    /// secret key. `variable_time` is passed straight through to
    /// [`PolyRq::is_zero`].
    pub fn is_transparent(&self, variable_time: bool) -> bool {
        self.polys[1..].iter().all(|p| p.is_zero(variable_time))
    }
}

impl Ciphertext<Coeff> {
    /// Element-wise forward NTT; preserves `correction_factor` and `seed`.
    pub fn forward_ntt(self) -> Ciphertext<Eval> {
        Ciphertext {
            context: self.context,
            polys: self.polys.into_iter().map(PolyRq::forward_ntt).collect(),
            correction_factor: self.correction_factor,
            seed: self.seed,
        }
    }

    /// Multiplies every coefficient polynomial by `X^k` in `R_q` (cyclic,
    /// with a sign flip whenever the shift wraps past `X^N = -1`). `k` may be
    /// negative or `>= N`.
    pub fn multiply_power_of_x(&mut self, k: i64) {
        let n = self.context.degree() as i64;
        let shift = k.rem_euclid(2 * n);
        for poly in self.polys.iter_mut() {
            let rows = poly.moduli_count();
            let deg = poly.degree();
            let mut shifted = vec![0u64; rows * deg];
            for (row, qi) in self.context.moduli().iter().enumerate() {
                let src = poly.row(row);
                for i in 0..deg {
                    let dest = (i as i64 + shift).rem_euclid(2 * n);
                    if dest < n {
                        shifted[row * deg + dest as usize] = src[i];
                    } else {
                        shifted[row * deg + (dest - n) as usize] = qi.neg_mod(src[i]);
                    }
                }
            }
            for row in 0..rows {
                poly.row_mut(row).copy_from_slice(&shifted[row * deg..(row + 1) * deg]);
            }
        }
        self.clear_seed();
    }
}

impl Ciphertext<Eval> {
    /// Element-wise inverse NTT; preserves `correction_factor` and `seed`.
    pub fn inverse_ntt(self) -> Ciphertext<Coeff> {
        Ciphertext {
            context: self.context,
            polys: self.polys.into_iter().map(PolyRq::inverse_ntt).collect(),
            correction_factor: self.correction_factor,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modulus::{generate_primes, Modulus, PrimePreference};

    fn test_context(degree: usize) -> PolyContext {
        let primes = generate_primes(20, 2 * degree as u64, PrimePreference::Large, 2, &[]).unwrap();
        let moduli: Vec<Modulus> = primes.into_iter().map(|q| Modulus::new(q).unwrap()).collect();
        PolyContext::new(degree, moduli).unwrap()
    }

    #[test]
    fn zero_ciphertext_is_transparent() {
        let ctx = test_context(8);
        let ct = Ciphertext::<Coeff>::zero_ciphertext(&ctx, 2);
        assert!(ct.is_transparent(true));
    }

    #[test]
    fn add_then_sub_recovers_original() {
        let ctx = test_context(8);
        let mut rng = rand::thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let b = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let ct_a = Ciphertext::new(ctx.clone(), vec![a.clone(), b.clone()], 1, None).unwrap();
        let mut sum = ct_a.clone();
        sum.add_assign(&ct_a).unwrap();
        sum.sub_assign(&ct_a).unwrap();
        assert_eq!(sum.polys()[0].as_slice(), ct_a.polys()[0].as_slice());
    }

    #[test]
    fn ntt_roundtrip_preserves_correction_factor() {
        let ctx = test_context(8);
        let zero = Ciphertext::<Coeff>::zero_ciphertext(&ctx, 2);
        let back = zero.forward_ntt().inverse_ntt();
        assert_eq!(back.correction_factor(), 1);
    }
}

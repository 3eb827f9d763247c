//! RNS polynomials over a shared [`PolyContext`], tagged at compile time with
//! their representation domain.
//!
//! The `Coeff`/`Eval` phantom tag follows the same pattern the teacher uses
//! for zero-cost compile-time configuration (`PolyConf`,
//! `eyelid-match-ops/src/primitives/poly/modular_poly/conf.rs`): instead of a
//! runtime flag that every call site has to check, mixing forms is a type
//! error caught by the compiler, and `forward_ntt`/`inverse_ntt` are the only
//! way to cross between them.

use std::marker::PhantomData;

use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{HeError, Result};
use crate::poly_context::PolyContext;

mod sealed {
    pub trait Sealed {}
}

/// Marker for the representation domain a [`PolyRq`] is in. Sealed: only
/// [`Coeff`] and [`Eval`] implement it.
pub trait PolyForm: sealed::Sealed + Clone + Copy + core::fmt::Debug {}

/// Coefficient representation: row `i` holds `poly mod q_i`'s coefficients
/// in the standard monomial basis.
#[derive(Clone, Copy, Debug)]
pub struct Coeff;
impl sealed::Sealed for Coeff {}
impl PolyForm for Coeff {}

/// Evaluation (NTT) representation: row `i` holds `poly mod q_i` evaluated at
/// the `N` primitive `2N`-th roots of unity used by that row's [`crate::ntt::NttTable`].
#[derive(Clone, Copy, Debug)]
pub struct Eval;
impl sealed::Sealed for Eval {}
impl PolyForm for Eval {}

/// An RNS polynomial of degree `N` over a [`PolyContext`], stored as an
/// `L x N` row-major array of residues, one row per modulus.
#[derive(Clone, Debug)]
pub struct PolyRq<F: PolyForm> {
    context: PolyContext,
    /// Row-major: `coeffs[i * N + j]` is coefficient `j` reduced mod `q_i`.
    coeffs: Vec<u64>,
    /// Whether this polynomial is known-public (a ciphertext's `a` term, a
    /// public key), letting arithmetic on it use the faster variable-time
    /// Barrett path instead of the constant-time one. Defaults to `false`;
    /// callers opt in explicitly via [`PolyRq::with_variable_time`].
    allow_variable_time: bool,
    _form: PhantomData<F>,
}

impl<F: PolyForm> PolyRq<F> {
    /// The context this polynomial is bound to.
    #[inline]
    pub fn context(&self) -> &PolyContext {
        &self.context
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.context.degree()
    }

    #[inline]
    pub fn moduli_count(&self) -> usize {
        self.context.moduli_count()
    }

    /// The residues of row `i`, i.e. the coefficients reduced mod `q_i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[u64] {
        let n = self.degree();
        &self.coeffs[i * n..(i + 1) * n]
    }

    /// Mutable access to row `i`.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [u64] {
        let n = self.degree();
        &mut self.coeffs[i * n..(i + 1) * n]
    }

    /// The flat backing storage, row-major.
    #[inline]
    pub fn as_slice(&self) -> &[u64] {
        &self.coeffs
    }

    /// The all-zero polynomial over `context`.
    pub fn zero(context: &PolyContext) -> Self {
        Self {
            context: context.clone(),
            coeffs: vec![0u64; context.moduli_count() * context.degree()],
            allow_variable_time: false,
            _form: PhantomData,
        }
    }

    /// Wraps already-reduced row-major coefficients as a polynomial over
    /// `context`. `coeffs.len()` must equal `context.moduli_count() *
    /// context.degree()`; callers that build coefficients by hand (lifting a
    /// plaintext into RNS form, reassembling a base-converted buffer) use
    /// this instead of `zero` + a row-by-row copy.
    pub fn from_coeffs(context: &PolyContext, coeffs: Vec<u64>) -> Self {
        debug_assert_eq!(coeffs.len(), context.moduli_count() * context.degree());
        Self {
            context: context.clone(),
            coeffs,
            allow_variable_time: false,
            _form: PhantomData,
        }
    }

    /// Multiplies every coefficient by the scalar `value`, reduced mod each
    /// row's modulus.
    pub fn mul_scalar_assign(&mut self, value: u64) {
        let n = self.degree();
        for (i, qi) in self.context.moduli().to_vec().iter().enumerate() {
            let scalar = value % qi.value();
            for x in self.coeffs[i * n..(i + 1) * n].iter_mut() {
                *x = qi.mul_mod_vt(*x, scalar);
            }
        }
    }

    /// Multiplies row `i` by `scalars[i]` (reduced mod that row's modulus).
    /// `scalars.len()` must equal `moduli_count()`. Used to build a
    /// key-switching digit's plaintext term, where each RNS row is scaled by
    /// a different CRT constant.
    pub fn mul_row_scalars_assign(&mut self, scalars: &[u64]) {
        let n = self.degree();
        for (i, qi) in self.context.moduli().to_vec().iter().enumerate() {
            let scalar = scalars[i] % qi.value();
            for x in self.coeffs[i * n..(i + 1) * n].iter_mut() {
                *x = qi.mul_mod_vt(*x, scalar);
            }
        }
    }

    /// A uniformly random polynomial over `context`, each coefficient drawn
    /// independently and uniformly from `[0, q_i)` via rejection sampling
    /// (avoids the bias a plain `% q_i` would introduce).
    pub fn random(context: &PolyContext, rng: &mut impl RngCore) -> Self {
        let n = context.degree();
        let mut coeffs = vec![0u64; context.moduli_count() * n];
        for (i, modulus) in context.moduli().iter().enumerate() {
            for j in 0..n {
                coeffs[i * n + j] = crate::prng::samplers::sample_uniform(modulus, rng);
            }
        }
        Self {
            context: context.clone(),
            coeffs,
            allow_variable_time: false,
            _form: PhantomData,
        }
    }

    /// Marks this polynomial as known-public, letting arithmetic on it take
    /// the faster variable-time Barrett path. Only call this on values with
    /// no secret-dependent content (a ciphertext's `a` term, a public key) —
    /// this is a declaration by the caller, not something derivable from the
    /// value itself.
    #[inline]
    pub fn with_variable_time(mut self) -> Self {
        self.allow_variable_time = true;
        self
    }

    /// Whether this polynomial is marked as known-public (see
    /// [`PolyRq::with_variable_time`]).
    #[inline]
    pub fn is_variable_time(&self) -> bool {
        self.allow_variable_time
    }

    fn check_same_context(&self, other: &Self) -> Result<()> {
        if self.context != other.context {
            return Err(HeError::InvalidContext);
        }
        Ok(())
    }

    /// `self += rhs`, pointwise per modulus. Requires matching contexts.
    pub fn add_assign(&mut self, rhs: &Self) -> Result<()> {
        self.check_same_context(rhs)?;
        let n = self.degree();
        for (i, q) in self.context.moduli().to_vec().iter().enumerate() {
            for j in 0..n {
                let idx = i * n + j;
                self.coeffs[idx] = q.add_mod(self.coeffs[idx], rhs.coeffs[idx]);
            }
        }
        Ok(())
    }

    /// `self -= rhs`, pointwise per modulus. Requires matching contexts.
    pub fn sub_assign(&mut self, rhs: &Self) -> Result<()> {
        self.check_same_context(rhs)?;
        let n = self.degree();
        for (i, q) in self.context.moduli().to_vec().iter().enumerate() {
            for j in 0..n {
                let idx = i * n + j;
                self.coeffs[idx] = q.sub_mod(self.coeffs[idx], rhs.coeffs[idx]);
            }
        }
        Ok(())
    }

    /// Pointwise negation, per modulus.
    pub fn neg(&self) -> Self {
        let n = self.degree();
        let mut coeffs = self.coeffs.clone();
        for (i, q) in self.context.moduli().iter().enumerate() {
            for j in 0..n {
                let idx = i * n + j;
                coeffs[idx] = q.neg_mod(self.coeffs[idx]);
            }
        }
        Self {
            context: self.context.clone(),
            coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }

    /// Whether every coefficient is zero. `variable_time` controls whether
    /// the scan is allowed to short-circuit; pass `false` for secret-derived
    /// polynomials so the timing doesn't leak which coefficient first differs.
    pub fn is_zero(&self, variable_time: bool) -> bool {
        if variable_time {
            self.coeffs.iter().all(|&c| c == 0)
        } else {
            self.coeffs.iter().fold(0u64, |acc, &c| acc | c) == 0
        }
    }

    /// Restricts `self` to a smaller context, asserting that `self`'s
    /// context is `to` extended with zero or more trailing moduli.
    ///
    /// Panics if `to` isn't a prefix-extension ancestor of `self`'s context;
    /// that's a programmer error (the caller should already know the chain
    /// relationship), not a runtime condition callers recover from.
    pub fn drop_context(&self, to: &PolyContext) -> Self {
        assert!(
            self.context.is_extension_of(to),
            "drop_context target is not an ancestor of this polynomial's context"
        );
        let n = self.degree();
        let mut coeffs = Vec::with_capacity(to.moduli_count() * n);
        for i in 0..to.moduli_count() {
            coeffs.extend_from_slice(self.row(i));
        }
        Self {
            context: to.clone(),
            coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }

    /// Overwrites the backing storage with zeros. Called explicitly by any
    /// code path that handled secret-derived coefficients once it's done
    /// with them, and automatically by `SecretKey`'s `Drop` impl.
    pub fn zeroize(&mut self) {
        self.coeffs.zeroize();
    }
}

impl PolyRq<Coeff> {
    /// In-place forward NTT: consumes a `Coeff`-form polynomial and returns
    /// its `Eval`-form representation.
    pub fn forward_ntt(mut self) -> PolyRq<Eval> {
        let n = self.degree();
        for i in 0..self.context.moduli_count() {
            let table = self.context.ntt_table(i).clone();
            table.forward_inplace(&mut self.coeffs[i * n..(i + 1) * n]);
        }
        PolyRq {
            context: self.context,
            coeffs: self.coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }

    /// Applies the Galois automorphism `X -> X^element` to a `Coeff`-form
    /// polynomial: `new[(i*element) mod 2N]` receives `coeffs[i]`, negated
    /// if the exponent wrapped past `N` (since `X^N = -1` in this ring).
    ///
    /// `element` must be odd (coprime to `2N`) for the map to be a bijection.
    pub fn apply_galois(&self, element: u64) -> Self {
        let n = self.degree();
        let two_n = 2 * n as u64;
        debug_assert!(element % 2 == 1, "galois element must be odd");

        let mut coeffs = vec![0u64; self.context.moduli_count() * n];
        for (row, q) in self.context.moduli().iter().enumerate() {
            let src = self.row(row);
            for i in 0..n {
                let e = (i as u64 * element) % two_n;
                if e < n as u64 {
                    coeffs[row * n + e as usize] = src[i];
                } else {
                    coeffs[row * n + (e as usize - n)] = q.neg_mod(src[i]);
                }
            }
        }
        Self {
            context: self.context.clone(),
            coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }

    /// Modulus-switches down by one level: drops the last RNS component,
    /// rounding each remaining coefficient by the nearest-integer quotient
    /// rather than truncating it.
    ///
    /// Used by key-switching's modulus-switch-down and by mod-switch
    /// operations on ciphertexts. The returned polynomial is bound to
    /// `self.context().next()`.
    pub fn divide_and_round_q_last(&self) -> Self {
        let smaller = self
            .context
            .next()
            .expect("divide_and_round_q_last requires at least 2 moduli")
            .clone();
        let n = self.degree();
        let last = self.context.moduli_count() - 1;
        let q_last = self.context.moduli()[last];
        let half = q_last.value() / 2;

        let last_row = self.row(last);
        let mut coeffs = Vec::with_capacity(smaller.moduli_count() * n);
        for i in 0..smaller.moduli_count() {
            let qi = smaller.moduli()[i];
            let row = self.row(i);
            for j in 0..n {
                // Center the last row's residue around 0, then rescale mod q_i:
                // round(x / q_last) mod q_i == (x_i - centered_last) * q_last^-1 mod q_i,
                // where centered_last is last[j] reduced into qi's residue class.
                let centered = if last_row[j] > half {
                    qi.neg_mod((q_last.value() - last_row[j]) % qi.value())
                } else {
                    last_row[j] % qi.value()
                };
                let diff = qi.sub_mod(row[j], centered);
                let q_last_inv = qi
                    .inverse_mod(q_last.value() % qi.value())
                    .expect("q_last must be invertible mod qi for distinct RNS primes");
                coeffs.push(qi.mul_mod(diff, q_last_inv));
            }
        }
        Self {
            context: smaller,
            coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }
}

impl PolyRq<Eval> {
    /// In-place inverse NTT: consumes an `Eval`-form polynomial and returns
    /// its `Coeff`-form representation.
    pub fn inverse_ntt(mut self) -> PolyRq<Coeff> {
        let n = self.degree();
        for i in 0..self.context.moduli_count() {
            let table = self.context.ntt_table(i).clone();
            table.inverse_inplace(&mut self.coeffs[i * n..(i + 1) * n]);
        }
        PolyRq {
            context: self.context,
            coeffs: self.coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }

    /// Pointwise multiplication, per modulus. Only defined in `Eval` form:
    /// `Coeff`-form polynomials don't have a `mul_assign` at all, so mixing
    /// up the forms is a compile error rather than a silently wrong product.
    ///
    /// Takes the variable-time Barrett path when either operand is marked
    /// [`PolyRq::with_variable_time`] — e.g. a fresh encryption's public `a`
    /// term times a secret key still has one secret-dependent operand, so
    /// this only ever skips the constant-time path when both sides are
    /// already known-public.
    pub fn mul_assign(&mut self, rhs: &Self) -> Result<()> {
        self.check_same_context(rhs)?;
        let variable_time = self.allow_variable_time && rhs.allow_variable_time;
        let n = self.degree();
        for (i, q) in self.context.moduli().to_vec().iter().enumerate() {
            for j in 0..n {
                let idx = i * n + j;
                self.coeffs[idx] = if variable_time {
                    q.mul_mod_vt(self.coeffs[idx], rhs.coeffs[idx])
                } else {
                    q.mul_mod(self.coeffs[idx], rhs.coeffs[idx])
                };
            }
        }
        Ok(())
    }

    /// Applies the Galois automorphism `X -> X^element` to an `Eval`-form
    /// polynomial by permuting evaluation points.
    ///
    /// The forward NTT's bit-reversed twiddle order places the evaluation at
    /// slot `i` at root `psi^(2*bitrev(i)+1)`; substituting `X -> X^element`
    /// moves the evaluation at root `r` to root `r*element mod 2N`, which
    /// this inverts back into a slot permutation.
    pub fn apply_galois(&self, element: u64) -> Self {
        let n = self.degree();
        let log_n = n.ilog2();
        let two_n = 2 * n as u64;
        debug_assert!(element % 2 == 1, "galois element must be odd");

        let perm = galois_eval_permutation(n, log_n, two_n, element);
        let mut coeffs = vec![0u64; self.context.moduli_count() * n];
        for row in 0..self.context.moduli_count() {
            let src = self.row(row);
            for i in 0..n {
                coeffs[row * n + i] = src[perm[i]];
            }
        }
        Self {
            context: self.context.clone(),
            coeffs,
            allow_variable_time: self.allow_variable_time,
            _form: PhantomData,
        }
    }
}

fn bit_reverse(mut x: u32, bits: u32) -> u32 {
    let mut r = 0u32;
    for _ in 0..bits {
        r = (r << 1) | (x & 1);
        x >>= 1;
    }
    r
}

fn galois_eval_permutation(n: usize, log_n: u32, two_n: u64, element: u64) -> Vec<usize> {
    (0..n)
        .map(|i| {
            let point = 2 * bit_reverse(i as u32, log_n) as u64 + 1;
            let target = (point * element) % two_n;
            let brv_index = (target - 1) / 2;
            bit_reverse(brv_index as u32, log_n) as usize
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modulus::{generate_primes, Modulus, PrimePreference};
    use rand::thread_rng;

    fn test_context(degree: usize, count: usize, bits: u32) -> PolyContext {
        let primes = generate_primes(bits, 2 * degree as u64, PrimePreference::Large, count, &[]).unwrap();
        let moduli: Vec<Modulus> = primes.into_iter().map(|q| Modulus::new(q).unwrap()).collect();
        PolyContext::new(degree, moduli).unwrap()
    }

    #[test]
    fn add_sub_are_inverse() {
        let ctx = test_context(8, 2, 20);
        let mut rng = thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let b = PolyRq::<Coeff>::random(&ctx, &mut rng);

        let mut sum = a.clone();
        sum.add_assign(&b).unwrap();
        sum.sub_assign(&b).unwrap();
        assert_eq!(sum.as_slice(), a.as_slice());
    }

    #[test]
    fn ntt_roundtrip_preserves_coefficients() {
        let ctx = test_context(8, 2, 20);
        let mut rng = thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let original = a.as_slice().to_vec();

        let back = a.forward_ntt().inverse_ntt();
        assert_eq!(back.as_slice(), &original[..]);
    }

    #[test]
    fn mul_in_eval_matches_schoolbook_mod_x_n_plus_1() {
        let degree = 8;
        let ctx = test_context(degree, 1, 20);
        let q = ctx.moduli()[0];

        let mut a = PolyRq::<Coeff>::zero(&ctx);
        let mut b = PolyRq::<Coeff>::zero(&ctx);
        a.row_mut(0)[0] = 3;
        a.row_mut(0)[1] = 5;
        b.row_mut(0)[0] = 7;
        b.row_mut(0)[2] = 2;

        let mut expected = vec![0u64; degree];
        for i in 0..degree {
            for j in 0..degree {
                let coeff = q.mul_mod(a.row(0)[i], b.row(0)[j]);
                let (idx, sign_neg) = if i + j < degree {
                    (i + j, false)
                } else {
                    (i + j - degree, true)
                };
                if sign_neg {
                    expected[idx] = q.sub_mod(expected[idx], coeff);
                } else {
                    expected[idx] = q.add_mod(expected[idx], coeff);
                }
            }
        }

        let mut ea = a.forward_ntt();
        let eb = b.forward_ntt();
        ea.mul_assign(&eb).unwrap();
        let product = ea.inverse_ntt();

        assert_eq!(product.row(0), &expected[..]);
    }

    #[test]
    fn galois_identity_element_is_identity() {
        let ctx = test_context(8, 1, 20);
        let mut rng = thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let permuted = a.apply_galois(1);
        assert_eq!(permuted.as_slice(), a.as_slice());
    }

    #[test]
    fn galois_commutes_with_ntt() {
        let ctx = test_context(8, 1, 20);
        let mut rng = thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let element = 3u64;

        let via_coeff = a.apply_galois(element).forward_ntt();
        let via_eval = a.forward_ntt().apply_galois(element);
        assert_eq!(via_coeff.as_slice(), via_eval.as_slice());
    }

    #[test]
    fn drop_context_truncates_rows() {
        let ctx = test_context(8, 3, 20);
        let mut rng = thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let smaller = ctx.next().unwrap();
        let dropped = a.drop_context(smaller);
        assert_eq!(dropped.moduli_count(), 2);
        assert_eq!(dropped.row(0), a.row(0));
        assert_eq!(dropped.row(1), a.row(1));
    }

    #[test]
    fn divide_and_round_q_last_reduces_level() {
        let ctx = test_context(8, 2, 20);
        let mut rng = thread_rng();
        let a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        let down = a.divide_and_round_q_last();
        assert_eq!(down.moduli_count(), 1);
    }

    #[test]
    fn zeroize_clears_storage() {
        let ctx = test_context(8, 1, 20);
        let mut rng = thread_rng();
        let mut a = PolyRq::<Coeff>::random(&ctx, &mut rng);
        a.zeroize();
        assert!(a.is_zero(true));
    }
}

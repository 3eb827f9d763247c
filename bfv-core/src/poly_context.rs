//! An ordered chain of RNS moduli shared by every polynomial built over it.
//!
//! A [`PolyContext`] is immutable after construction and meant to be held
//! behind an [`Arc`] and shared across every [`crate::poly::PolyRq`], key, and
//! ciphertext that uses it — mirroring how the teacher's `PolyConf` trait
//! objects (`eyelid-match-ops/src/primitives/poly/modular_poly/conf.rs`) are
//! shared zero-sized/const-parameterized configs, except here the moduli
//! chain is chosen at runtime so it has to be an owned, ref-counted value
//! rather than a type parameter.

use std::sync::Arc;

use crate::error::{HeError, Result};
use crate::modulus::Modulus;
use crate::ntt::NttTable;

/// An ordered sequence of NTT-friendly RNS moduli for ring degree `N`,
/// together with their precomputed NTT twiddle tables.
///
/// Cheap to clone (an `Arc` bump); every polynomial, key, and ciphertext
/// built over a given moduli chain holds one of these.
#[derive(Clone, Debug)]
pub struct PolyContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    degree: usize,
    moduli: Vec<Modulus>,
    ntt_tables: Vec<NttTable>,
    /// The context with the last modulus dropped, if any; forms a singly
    /// linked chain down to a one-modulus (or empty) context.
    next: Option<PolyContext>,
}

impl PolyContext {
    /// Builds a context for ring degree `degree` over `moduli`, in the given
    /// order. `degree` must be a power of two; every modulus must be
    /// NTT-friendly for it (`q ≡ 1 mod 2*degree`).
    pub fn new(degree: usize, moduli: Vec<Modulus>) -> Result<Self> {
        if moduli.is_empty() {
            return Err(HeError::EmptyModulus);
        }
        if !degree.is_power_of_two() {
            return Err(HeError::InvalidPolyContext("degree must be a power of two"));
        }

        let ntt_tables = moduli
            .iter()
            .map(|&m| NttTable::new(m, degree))
            .collect::<Result<Vec<_>>>()?;

        let next = if moduli.len() > 1 {
            Some(Self::new(degree, moduli[..moduli.len() - 1].to_vec())?)
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(Inner {
                degree,
                moduli,
                ntt_tables,
                next,
            }),
        })
    }

    /// The ring degree `N`.
    #[inline]
    pub fn degree(&self) -> usize {
        self.inner.degree
    }

    /// The number of RNS moduli (`L`).
    #[inline]
    pub fn moduli_count(&self) -> usize {
        self.inner.moduli.len()
    }

    /// The moduli chain, `[q_0, ..., q_{L-1}]`.
    #[inline]
    pub fn moduli(&self) -> &[Modulus] {
        &self.inner.moduli
    }

    /// The NTT table for row `i`.
    #[inline]
    pub fn ntt_table(&self, i: usize) -> &NttTable {
        &self.inner.ntt_tables[i]
    }

    /// All NTT tables, one per row.
    #[inline]
    pub fn ntt_tables(&self) -> &[NttTable] {
        &self.inner.ntt_tables
    }

    /// The context with the last modulus dropped, or `None` if this context
    /// already holds a single modulus.
    pub fn next(&self) -> Option<&PolyContext> {
        self.inner.next.as_ref()
    }

    /// Whether `self` is `other` extended with zero or more additional
    /// trailing moduli — i.e. `other` is reachable from `self` by following
    /// [`PolyContext::next`] some number of times.
    pub fn is_extension_of(&self, other: &PolyContext) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match self.next() {
            Some(n) => n.is_extension_of(other),
            None => false,
        }
    }

    /// `(prod(moduli)) mod m`, computed modulus-by-modulus to avoid building
    /// the full product. Used pervasively by [`crate::rns::tool::RnsTool`]
    /// setup (e.g. to derive `q_mod_t`).
    pub fn q_remainder(&self, m: &Modulus) -> u64 {
        self.inner
            .moduli
            .iter()
            .fold(1u64 % m.value(), |acc, q| m.mul_mod_vt(acc, q.value() % m.value()))
    }

    /// An upper bound on how many full-width (`< q^2`) products can be
    /// summed into a 2x-word (128-bit) accumulator before it might overflow,
    /// for the *largest* modulus in this context.
    ///
    /// Used by the BFV inner-product engine (the dot product behind
    /// decryption and the `c0 + c1*s` ciphertext combination) to decide how
    /// many terms it can accumulate lazily before an intermediate reduction
    /// is required.
    pub fn max_lazy_product_accumulation_count(&self) -> usize {
        let max_bits = self
            .inner
            .moduli
            .iter()
            .map(Modulus::bits)
            .max()
            .unwrap_or(0);
        // Each term occupies up to 2*max_bits bits; a 128-bit accumulator
        // has 128 - 2*max_bits bits of headroom before a carry could be lost.
        let headroom = 128u32.saturating_sub(2 * max_bits);
        1usize << headroom.min(62)
    }
}

impl PartialEq for PolyContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || (self.degree() == other.degree() && self.moduli() == other.moduli())
    }
}
impl Eq for PolyContext {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modulus::{generate_primes, PrimePreference};

    fn moduli(n: usize, bits: u32, degree: usize) -> Vec<Modulus> {
        generate_primes(bits, 2 * degree as u64, PrimePreference::Large, n, &[])
            .unwrap()
            .into_iter()
            .map(|q| Modulus::new(q).unwrap())
            .collect()
    }

    #[test]
    fn next_drops_last_modulus() {
        let degree = 8;
        let q = moduli(3, 20, degree);
        let ctx = PolyContext::new(degree, q.clone()).unwrap();
        assert_eq!(ctx.moduli_count(), 3);

        let n1 = ctx.next().unwrap();
        assert_eq!(n1.moduli_count(), 2);
        assert_eq!(n1.moduli(), &q[..2]);

        let n2 = n1.next().unwrap();
        assert_eq!(n2.moduli_count(), 1);
        assert!(n2.next().is_none());
    }

    #[test]
    fn rejects_non_ntt_friendly_modulus() {
        let degree = 8;
        let bad = Modulus::new(11).unwrap();
        assert!(PolyContext::new(degree, vec![bad]).is_err());
    }

    #[test]
    fn q_remainder_matches_naive_product() {
        let degree = 8;
        let q = moduli(3, 20, degree);
        let ctx = PolyContext::new(degree, q.clone()).unwrap();
        let m = Modulus::new(97).unwrap();

        let naive = q.iter().fold(1u128, |acc, qi| acc * qi.value() as u128) % 97;
        assert_eq!(ctx.q_remainder(&m), naive as u64);
    }

    #[test]
    fn is_extension_of_follows_the_chain() {
        let degree = 8;
        let q = moduli(3, 20, degree);
        let ctx = PolyContext::new(degree, q).unwrap();
        let n1 = ctx.next().unwrap().clone();
        let n2 = n1.next().unwrap().clone();
        assert!(ctx.is_extension_of(&n1));
        assert!(ctx.is_extension_of(&n2));
        assert!(!n2.is_extension_of(&ctx));
    }
}

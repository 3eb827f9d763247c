//! Number-theoretic transform: Harvey's butterfly, with precomputed,
//! modulus-specific twiddle tables.
//!
//! An [`NttTable`] is built once per `(modulus, degree)` pair and shared by
//! every [`crate::poly::PolyRq`] that uses that modulus, matching the way
//! [`crate::poly_context::PolyContext`] shares one [`NttTable`] per row across
//! every polynomial bound to it.

use crate::error::{HeError, Result};
use crate::modulus::Modulus;

/// Precomputed forward/inverse twiddle factors for the negacyclic NTT over
/// `Z_q[X]/(X^N+1)`.
///
/// Requires `q ≡ 1 (mod 2N)` so that a primitive `2N`-th root of unity
/// (`psi`) exists in `Z_q`; `psi^2` is then a primitive `N`-th root used for
/// the ordinary (cyclic) NTT, and multiplying by powers of `psi` before/after
/// folds the negacyclic reduction into the transform itself (the standard
/// trick — see e.g. Longa & Naehrig).
#[derive(Clone, Debug)]
pub struct NttTable {
    modulus: Modulus,
    degree: usize,
    /// Powers of `psi` in bit-reversed order, for the forward transform.
    forward_roots: Vec<u64>,
    forward_roots_shoup: Vec<u64>,
    /// Powers of `psi^-1` in bit-reversed order, for the inverse transform.
    inverse_roots: Vec<u64>,
    inverse_roots_shoup: Vec<u64>,
    /// `N^-1 mod q`, applied once at the end of the inverse transform.
    inv_degree: u64,
    inv_degree_shoup: u64,
}

impl NttTable {
    /// Builds the twiddle tables for `degree`-dimensional polynomials modulo
    /// `modulus`.
    ///
    /// Returns [`HeError::InvalidModulus`] if `modulus` doesn't admit a
    /// primitive `2*degree`-th root of unity (i.e. isn't NTT-friendly for
    /// `degree`).
    pub fn new(modulus: Modulus, degree: usize) -> Result<Self> {
        if !degree.is_power_of_two() {
            return Err(HeError::InvalidModulus("degree must be a power of two"));
        }
        let two_n = 2 * degree as u64;
        if (modulus.value() - 1) % two_n != 0 {
            return Err(HeError::InvalidModulus(
                "modulus is not NTT-friendly for this degree",
            ));
        }

        let psi = find_primitive_root(modulus, two_n)?;
        let psi_inv = modulus.inverse_mod(psi)?;

        let forward_roots = bit_reversed_powers(modulus, psi, degree);
        let inverse_roots = bit_reversed_powers(modulus, psi_inv, degree);
        let forward_roots_shoup = forward_roots
            .iter()
            .map(|&r| modulus.shoup_precompute(r))
            .collect();
        let inverse_roots_shoup = inverse_roots
            .iter()
            .map(|&r| modulus.shoup_precompute(r))
            .collect();

        let inv_degree = modulus.inverse_mod(degree as u64 % modulus.value())?;
        let inv_degree_shoup = modulus.shoup_precompute(inv_degree);

        Ok(Self {
            modulus,
            degree,
            forward_roots,
            forward_roots_shoup,
            inverse_roots,
            inverse_roots_shoup,
            inv_degree,
            inv_degree_shoup,
        })
    }

    /// The modulus this table was built for.
    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    /// In-place forward NTT (Cooley-Tukey, decimation-in-time). `coeffs` is
    /// `Coeff`-form on entry, `Eval`-form (in bit-reversed-free natural
    /// order) on exit.
    pub fn forward_inplace(&self, coeffs: &mut [u64]) {
        debug_assert_eq!(coeffs.len(), self.degree);
        let n = self.degree;
        let q = &self.modulus;

        let mut t = n;
        let mut root_index = 1usize;
        let mut m = 1usize;
        while m < n {
            t /= 2;
            for i in 0..m {
                let root = self.forward_roots[root_index];
                let root_shoup = self.forward_roots_shoup[root_index];
                root_index += 1;

                let j1 = 2 * i * t;
                let j2 = j1 + t;
                for j in j1..j2 {
                    let u = coeffs[j];
                    let v = q.mul_mod_shoup(coeffs[j + t], root, root_shoup);
                    coeffs[j] = q.add_mod(u, v);
                    coeffs[j + t] = q.sub_mod(u, v);
                }
            }
            m *= 2;
        }
    }

    /// In-place inverse NTT (Gentleman-Sande, decimation-in-frequency),
    /// including the final multiplication by `N^-1`. `coeffs` is `Eval`-form
    /// on entry, `Coeff`-form on exit.
    pub fn inverse_inplace(&self, coeffs: &mut [u64]) {
        debug_assert_eq!(coeffs.len(), self.degree);
        let n = self.degree;
        let q = &self.modulus;

        let mut t = 1usize;
        let mut m = n;
        let mut root_index = 1usize;
        while m > 1 {
            let mut j1 = 0usize;
            let h = m / 2;
            for _ in 0..h {
                let root = self.inverse_roots[root_index];
                let root_shoup = self.inverse_roots_shoup[root_index];
                root_index += 1;

                let j2 = j1 + t;
                for j in j1..j2 {
                    let u = coeffs[j];
                    let v = coeffs[j + t];
                    coeffs[j] = q.add_mod(u, v);
                    let diff = q.sub_mod(u, v);
                    coeffs[j + t] = q.mul_mod_shoup(diff, root, root_shoup);
                }
                j1 += 2 * t;
            }
            t *= 2;
            m /= 2;
        }

        for c in coeffs.iter_mut() {
            *c = q.mul_mod_shoup(*c, self.inv_degree, self.inv_degree_shoup);
        }
    }
}

/// Returns the bit-reversal permutation table's worth of powers of `root`,
/// i.e. `powers[bit_reverse(i, log2(n))] = root^i mod q` for `i in 0..n`,
/// which is the layout Harvey's NTT consumes its twiddles in.
fn bit_reversed_powers(modulus: Modulus, root: u64, n: usize) -> Vec<u64> {
    let log_n = n.ilog2();
    let mut powers = vec![0u64; n];
    let mut cur = 1u64 % modulus.value();
    for i in 0..n {
        powers[bit_reverse(i as u32, log_n) as usize] = cur;
        cur = modulus.mul_mod_vt(cur, root);
    }
    powers
}

fn bit_reverse(mut x: u32, bits: u32) -> u32 {
    let mut r = 0u32;
    for _ in 0..bits {
        r = (r << 1) | (x & 1);
        x >>= 1;
    }
    r
}

/// Finds a primitive `order`-th root of unity mod `modulus`, via a generator
/// search followed by exponentiation (`order` divides `modulus.value() - 1`).
fn find_primitive_root(modulus: Modulus, order: u64) -> Result<u64> {
    let q = modulus.value();
    if (q - 1) % order != 0 {
        return Err(HeError::InvalidModulus(
            "order does not divide q - 1",
        ));
    }
    let exponent = (q - 1) / order;
    let mut candidate = 2u64;
    while candidate < q {
        let root = modulus.pow_mod(candidate, exponent);
        if is_primitive(modulus, root, order) {
            return Ok(root);
        }
        candidate += 1;
    }
    Err(HeError::InvalidModulus(
        "no primitive root found (modulus may not be prime)",
    ))
}

/// Whether `root^order == 1` but `root^(order/p) != 1` for every prime
/// factor `p` of `order`. `order` is always a power of two here (`2N`), so
/// the only prime factor to check is 2.
fn is_primitive(modulus: Modulus, root: u64, order: u64) -> bool {
    if root == 0 {
        return false;
    }
    if modulus.pow_mod(root, order) != 1 {
        return false;
    }
    modulus.pow_mod(root, order / 2) != 1
}

#[cfg(test)]
mod test {
    use super::*;

    fn small_modulus() -> Modulus {
        // 65537 = 2^16 + 1, NTT-friendly for degree up to 2^15.
        Modulus::new(65537).unwrap()
    }

    #[test]
    fn forward_then_inverse_is_identity() {
        let q = small_modulus();
        let degree = 8;
        let table = NttTable::new(q, degree).unwrap();

        let original: Vec<u64> = (0..degree as u64).collect();
        let mut coeffs = original.clone();
        table.forward_inplace(&mut coeffs);
        table.inverse_inplace(&mut coeffs);

        assert_eq!(coeffs, original);
    }

    #[test]
    fn ntt_is_linear() {
        let q = small_modulus();
        let degree = 8;
        let table = NttTable::new(q, degree).unwrap();

        let a: Vec<u64> = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let b: Vec<u64> = vec![8, 7, 6, 5, 4, 3, 2, 1];
        let mut sum: Vec<u64> = a.iter().zip(&b).map(|(x, y)| q.add_mod(*x, *y)).collect();

        let mut ea = a.clone();
        let mut eb = b.clone();
        table.forward_inplace(&mut ea);
        table.forward_inplace(&mut eb);
        let mut esum: Vec<u64> = ea.iter().zip(&eb).map(|(x, y)| q.add_mod(*x, *y)).collect();

        table.forward_inplace(&mut sum);
        assert_eq!(sum, esum);

        table.inverse_inplace(&mut esum);
        assert_eq!(esum, a.iter().zip(&b).map(|(x, y)| q.add_mod(*x, *y)).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_non_ntt_friendly_modulus() {
        // 97 - 1 = 96 = 2^5 * 3, not divisible by 2*8 = 16... actually 96/16=6, so
        // pick a modulus genuinely incompatible with degree 8 (needs q ≡ 1 mod 16).
        let q = Modulus::new(11).unwrap(); // 10 is not divisible by 16
        assert!(NttTable::new(q, 8).is_err());
    }
}

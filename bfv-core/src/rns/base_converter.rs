//! Approximate RNS base conversion and exact CRT composition.
//!
//! Grounded in the BEHZ base-extension routine used by every RNS-BFV
//! implementation in the retrieved pack (`nulltea-bfv`'s `rns` helpers,
//! `fionser-fhe.rs`'s key-switching base conversion) — precompute
//! `(Q/q_i)^-1 mod q_i` and `(Q/q_i) mod p_j` once, then every conversion is
//! a row of modular multiplies followed by an accumulate-and-reduce.

use crate::bigint::MultiPrecisionInt;
use crate::error::{HeError, Result};
use crate::rns::RnsBase;

/// Converts RNS-represented polynomials between two bases `from = {q_0..q_{k-1}}`
/// and `to = {p_0..p_{m-1}}`.
///
/// [`RnsBaseConverter::convert_approximate`] is *approximate*: the result is
/// congruent to the true value modulo each `p_j`, but carries an additive
/// error of `a * Q` for some small `a` — exactness only holds when the
/// caller has independent knowledge (e.g. via `m_sk`, as in
/// [`crate::rns::tool::RnsTool`]) to correct for it. [`RnsBaseConverter::crt_compose`]
/// is exact.
#[derive(Clone, Debug)]
pub struct RnsBaseConverter {
    from: RnsBase,
    to: RnsBase,
    /// `(Q/q_i)^-1 mod q_i`, one per `from` modulus.
    q_hat_inv_mod_qi: Vec<u64>,
    /// `(Q/q_i) mod p_j`, indexed `[i][j]`.
    q_hat_mod_pj: Vec<Vec<u64>>,
}

impl RnsBaseConverter {
    /// Builds a converter from `from` to `to`. `from` must be non-empty.
    pub fn new(from: RnsBase, to: RnsBase) -> Result<Self> {
        if from.count() == 0 {
            return Err(HeError::EmptyModulus);
        }

        let k = from.count();
        let mut q_hat_inv_mod_qi = Vec::with_capacity(k);
        for i in 0..k {
            let qi = from.moduli()[i];
            let mut q_hat_mod_qi = 1u64 % qi.value();
            for (j, qj) in from.moduli().iter().enumerate() {
                if j != i {
                    q_hat_mod_qi = qi.mul_mod_vt(q_hat_mod_qi, qj.value() % qi.value());
                }
            }
            q_hat_inv_mod_qi.push(qi.inverse_mod(q_hat_mod_qi)?);
        }

        let mut q_hat_mod_pj = Vec::with_capacity(k);
        for i in 0..k {
            let mut row = Vec::with_capacity(to.count());
            for pj in to.moduli() {
                let mut acc = 1u64 % pj.value();
                for (l, ql) in from.moduli().iter().enumerate() {
                    if l != i {
                        acc = pj.mul_mod_vt(acc, ql.value() % pj.value());
                    }
                }
                row.push(acc);
            }
            q_hat_mod_pj.push(row);
        }

        Ok(Self {
            from,
            to,
            q_hat_inv_mod_qi,
            q_hat_mod_pj,
        })
    }

    pub fn from_base(&self) -> &RnsBase {
        &self.from
    }

    pub fn to_base(&self) -> &RnsBase {
        &self.to
    }

    /// Premultiplies `poly` (row-major, `from.count()` rows of `from.degree()`
    /// residues) in place by `(Q/q_i)^-1 mod q_i`, so that one premultiplied
    /// buffer can be accumulated into several different target bases (as
    /// [`crate::rns::tool::RnsTool::scale_and_round`] does for `{t, gamma}`)
    /// without repeating this step.
    pub fn convert_approximate_products(&self, poly: &mut [u64]) {
        let n = self.from.degree();
        for (i, qi) in self.from.moduli().iter().enumerate() {
            let row = &mut poly[i * n..(i + 1) * n];
            for x in row.iter_mut() {
                *x = qi.mul_mod(*x, self.q_hat_inv_mod_qi[i]);
            }
        }
    }

    /// Accumulates an already-premultiplied buffer (see
    /// [`RnsBaseConverter::convert_approximate_products`]) into the `to` base.
    pub fn accumulate_products(&self, premultiplied: &[u64]) -> Vec<u64> {
        let n = self.from.degree();
        let k = self.from.count();
        let mut out = vec![0u64; self.to.count() * n];
        for (j, pj) in self.to.moduli().iter().enumerate() {
            for idx in 0..n {
                let mut acc: u128 = 0;
                for i in 0..k {
                    acc += premultiplied[i * n + idx] as u128 * self.q_hat_mod_pj[i][j] as u128;
                }
                out[j * n + idx] = pj.reduce_u128(acc);
            }
        }
        out
    }

    /// `poly_Q -> poly_P`: for each coefficient, an element congruent to
    /// `x mod p_j` for every `j`, up to an additive error of `a*Q` for some
    /// small `a`.
    pub fn convert_approximate(&self, poly: &[u64]) -> Vec<u64> {
        let mut premultiplied = poly.to_vec();
        self.convert_approximate_products(&mut premultiplied);
        self.accumulate_products(&premultiplied)
    }

    /// Exact CRT composition of a `from`-base polynomial into a vector of
    /// wide integers, one per coefficient, each in `[0, Q)` where
    /// `Q = prod(from.moduli())`.
    ///
    /// Picking `V` too narrow for [`RnsBaseConverter::compose_max_intermediate_value`]
    /// silently truncates the result; callers are expected to size `V`
    /// via that bound.
    pub fn crt_compose<V: MultiPrecisionInt>(&self, poly: &[u64]) -> Vec<V> {
        let n = self.from.degree();
        let k = self.from.count();

        let q_hat: Vec<V> = (0..k)
            .map(|i| {
                self.from
                    .moduli()
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .fold(V::from_u64(1), |acc, (_, qj)| acc.mul_wide(V::from_u64(qj.value())))
            })
            .collect();
        let q_total: V = self
            .from
            .moduli()
            .iter()
            .fold(V::from_u64(1), |acc, qi| acc.mul_wide(V::from_u64(qi.value())));

        let mut out = Vec::with_capacity(n);
        for idx in 0..n {
            let mut acc = V::from_u64(0);
            for i in 0..k {
                let qi = self.from.moduli()[i];
                let y_i = qi.mul_mod(poly[i * n + idx], self.q_hat_inv_mod_qi[i]);
                acc = acc.add_wide(V::from_u64(y_i).mul_wide(q_hat[i]));
            }
            out.push(acc.rem_wide(q_total));
        }
        out
    }

    /// An upper bound (in bits) on the values [`RnsBaseConverter::crt_compose`]
    /// can produce, i.e. `ceil(log2(Q))` for `Q = prod(from.moduli())`. Callers
    /// use this to pick the narrowest [`MultiPrecisionInt`] width that won't
    /// truncate.
    pub fn compose_max_intermediate_value(&self) -> u32 {
        self.from.moduli().iter().map(|q| q.bits()).sum()
    }
}

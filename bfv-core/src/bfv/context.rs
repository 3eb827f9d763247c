//! The top-level handle binding a [`ParameterSet`] to concrete primes, the
//! ciphertext and key-switching [`PolyContext`]s, and a precomputed
//! [`RnsTool`] at every modulus-chain level a ciphertext can mod-switch down
//! to.
//!
//! Per §5's concurrency model, a `Context` is immutable after construction
//! and meant to be shared by reference across every key, plaintext, and
//! ciphertext built over it — so all of its derived state is computed once
//! here rather than cached lazily behind interior mutability.

use crate::bfv::params::ParameterSet;
use crate::error::{HeError, Result};
use crate::modulus::{generate_primes, Modulus, PrimePreference};
use crate::poly_context::PolyContext;
use crate::rns::tool::RnsTool;

#[derive(Clone, Debug)]
pub struct Context {
    params: ParameterSet,
    plaintext_modulus: Modulus,
    ciphertext_context: PolyContext,
    key_switch_context: PolyContext,
    /// One [`RnsTool`] per modulus-chain level, from the full chain down to a
    /// single modulus, indexed by `moduli_count - 1`.
    rns_tools: Vec<RnsTool>,
}

impl Context {
    /// Builds a `Context` from a named or ad-hoc [`ParameterSet`]: generates
    /// the coefficient-modulus chain and one special modulus for hybrid key
    /// switching, then precomputes an [`RnsTool`] for every level a
    /// ciphertext can be mod-switched down to.
    #[tracing::instrument(skip(params), fields(degree = params.degree, moduli = params.coefficient_moduli_bits.len()))]
    pub fn new(params: ParameterSet) -> Result<Self> {
        if !params.degree.is_power_of_two() || params.degree < 2 {
            return Err(HeError::InvalidEncryptionParameters("degree must be a power of two >= 2"));
        }
        if params.coefficient_moduli_bits.is_empty() {
            return Err(HeError::InvalidEncryptionParameters("coefficient modulus chain must be non-empty"));
        }

        let ntt_degree = 2 * params.degree as u64;
        let plaintext_modulus = Modulus::new(params.plaintext_modulus)?;

        let mut exclude = vec![params.plaintext_modulus];
        let mut q_moduli = Vec::with_capacity(params.coefficient_moduli_bits.len());
        for &bits in &params.coefficient_moduli_bits {
            let prime = generate_primes(bits, ntt_degree, PrimePreference::Large, 1, &exclude)?[0];
            exclude.push(prime);
            q_moduli.push(Modulus::new(prime)?);
        }

        let special_bits = params.coefficient_moduli_bits.iter().copied().max().unwrap_or(61).min(61);
        let special_prime = generate_primes(special_bits, ntt_degree, PrimePreference::Large, 1, &exclude)?[0];

        let ciphertext_context = PolyContext::new(params.degree, q_moduli.clone())?;
        let mut ks_moduli = q_moduli;
        ks_moduli.push(Modulus::new(special_prime)?);
        let key_switch_context = PolyContext::new(params.degree, ks_moduli)?;

        let mut rns_tools = Vec::with_capacity(ciphertext_context.moduli_count());
        let mut level = Some(ciphertext_context.clone());
        while let Some(ctx) = level {
            rns_tools.push(RnsTool::new(ctx.clone(), plaintext_modulus)?);
            level = ctx.next().cloned();
        }

        tracing::debug!(levels = rns_tools.len(), "context ready");
        Ok(Self {
            params,
            plaintext_modulus,
            ciphertext_context,
            key_switch_context,
            rns_tools,
        })
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.ciphertext_context.degree()
    }

    #[inline]
    pub fn moduli_count(&self) -> usize {
        self.ciphertext_context.moduli_count()
    }

    #[inline]
    pub fn plaintext_modulus(&self) -> Modulus {
        self.plaintext_modulus
    }

    #[inline]
    pub fn ciphertext_context(&self) -> &PolyContext {
        &self.ciphertext_context
    }

    #[inline]
    pub fn key_switch_context(&self) -> &PolyContext {
        &self.key_switch_context
    }

    /// The special modulus appended for hybrid key switching — the last
    /// entry of [`Context::key_switch_context`].
    pub fn special_modulus(&self) -> Modulus {
        let ks = &self.key_switch_context;
        ks.moduli()[ks.moduli_count() - 1]
    }

    /// The [`RnsTool`] bound to a ciphertext context at the given number of
    /// remaining moduli.
    pub fn rns_tool(&self, moduli_count: usize) -> Result<&RnsTool> {
        self.rns_tools
            .iter()
            .find(|tool| tool.q_context().moduli_count() == moduli_count)
            .ok_or(HeError::InvalidPolyContext("no RnsTool at this modulus-chain level"))
    }

    /// The [`RnsTool`] bound to the full ciphertext context.
    pub fn rns_tool_top(&self) -> &RnsTool {
        &self.rns_tools[0]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_params() -> ParameterSet {
        ParameterSet {
            degree: 8,
            plaintext_modulus: 17,
            coefficient_moduli_bits: vec![20, 20],
            error_std_dev_milli: 3200,
            security_level: crate::bfv::params::SecurityLevel::Classical128,
        }
    }

    #[test]
    fn builds_rns_tool_for_every_level() {
        let ctx = Context::new(test_params()).unwrap();
        assert_eq!(ctx.moduli_count(), 2);
        assert!(ctx.rns_tool(2).is_ok());
        assert!(ctx.rns_tool(1).is_ok());
        assert!(ctx.rns_tool(3).is_err());
    }

    #[test]
    fn key_switch_context_has_one_extra_modulus() {
        let ctx = Context::new(test_params()).unwrap();
        assert_eq!(ctx.key_switch_context().moduli_count(), ctx.moduli_count() + 1);
    }
}

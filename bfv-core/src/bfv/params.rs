//! Named encryption-parameter sets (§6 "Parameter identifiers").
//!
//! Mirrors the teacher's associated-const configuration-struct pattern
//! (`YasheConf`/`PolyConf` in `primitives/yashe/conf.rs`), generalized to
//! runtime data: an RNS moduli chain isn't expressible as a single
//! compile-time const the way YASHE's single-modulus `T`/`DELTA` pair is.

use crate::error::{HeError, Result};

/// Target security level a [`ParameterSet`] was chosen to satisfy. Informational
/// only — this crate does not itself run a security estimator, it records the
/// claim the named set was published under.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SecurityLevel {
    /// 128-bit classical security against known lattice attacks.
    Classical128,
    /// 128-bit security under a post-quantum cost model.
    PostQuantum128,
}

/// A resolved set of BFV encryption parameters: ring degree, plaintext
/// modulus, the bit-widths of the ciphertext coefficient-modulus chain, the
/// error distribution's standard deviation, and the claimed security level.
///
/// The coefficient moduli themselves are generated at [`crate::bfv::context::Context`]
/// construction time (NTT-friendly primes of the given bit sizes), not stored
/// here — two runs with the same named set may pick different actual primes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSet {
    pub degree: usize,
    pub plaintext_modulus: u64,
    pub coefficient_moduli_bits: Vec<u32>,
    pub error_std_dev_milli: u32,
    pub security_level: SecurityLevel,
}

impl ParameterSet {
    /// The error standard deviation as a float (stored as milli-units above
    /// so the struct can derive `Eq`).
    pub fn error_std_dev(&self) -> f64 {
        self.error_std_dev_milli as f64 / 1000.0
    }

    /// Resolves a symbolic parameter-set name (e.g. `n_4096_logq_27_28_28_logt_5`)
    /// to its concrete [`ParameterSet`].
    pub fn named(name: &str) -> Result<Self> {
        match name {
            "n_4096_logq_27_28_28_logt_5" => Ok(Self {
                degree: 4096,
                plaintext_modulus: 17,
                coefficient_moduli_bits: vec![27, 28, 28],
                error_std_dev_milli: 3200,
                security_level: SecurityLevel::Classical128,
            }),
            "n_8192_logq_3x55_logt_42" => Ok(Self {
                degree: 8192,
                plaintext_modulus: 1 << 41,
                coefficient_moduli_bits: vec![55, 55, 55],
                error_std_dev_milli: 3200,
                security_level: SecurityLevel::Classical128,
            }),
            "n_16384_logq_5x55_logt_20" => Ok(Self {
                degree: 16384,
                plaintext_modulus: 1 << 19,
                coefficient_moduli_bits: vec![55, 55, 55, 55, 55],
                error_std_dev_milli: 3200,
                security_level: SecurityLevel::PostQuantum128,
            }),
            _ => Err(HeError::InvalidEncryptionParameters("unknown parameter set name")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn named_sets_resolve() {
        let p = ParameterSet::named("n_4096_logq_27_28_28_logt_5").unwrap();
        assert_eq!(p.degree, 4096);
        assert_eq!(p.coefficient_moduli_bits.len(), 3);
        assert!((p.error_std_dev() - 3.2).abs() < 1e-9);
    }

    #[test]
    fn unknown_name_errors() {
        assert!(ParameterSet::named("not-a-real-set").is_err());
    }
}

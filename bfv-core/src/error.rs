//! The stable error surface returned by every fallible operation in this crate.
//!
//! Precondition violations that indicate programmer error (mixing `Coeff`/`Eval`
//! polynomials, for instance) are compile-time prevented by the phantom tag on
//! [`crate::poly::PolyRq`] wherever possible, and panic via `assert!`/`debug_assert!`
//! where they cannot be caught statically. Everything else returns [`HeError`].

use thiserror::Error;

/// Errors surfaced by the RNS-BFV core.
///
/// Variants are named after the kind of precondition or invariant they report,
/// not after the call site that raised them, so that a caller can match on the
/// kind of failure regardless of which operation produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeError {
    /// Two operands carry contexts that do not match.
    #[error("operands belong to different contexts")]
    InvalidContext,

    /// A ciphertext's shape violates a precondition of the operation
    /// (wrong number of polynomials, wrong format, mismatched moduli count).
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(&'static str),

    /// A `PolyContext` construction or lookup failed its shape invariants.
    #[error("invalid poly context: {0}")]
    InvalidPolyContext(&'static str),

    /// A plaintext and ciphertext disagree on moduli count or context.
    #[error("plaintext and ciphertext are not compatible")]
    IncompatibleCiphertextAndPlaintext,

    /// `correction_factor != 1` where only the unit factor is supported.
    #[error("correction factor must be 1 for this operation, was {0}")]
    InvalidCorrectionFactor(u64),

    /// Parameters fail security or NTT-compatibility checks.
    #[error("invalid encryption parameters: {0}")]
    InvalidEncryptionParameters(&'static str),

    /// The requested rotation step is not representable with the available Galois keys.
    #[error("rotation step {0} is not representable with the available Galois keys")]
    InvalidRotationStep(i64),

    /// No Galois key is present at all.
    #[error("no Galois key available")]
    MissingGaloisKey,

    /// A Galois key is present, but not for the requested element.
    #[error("no Galois key for element {0}")]
    MissingGaloisElement(u64),

    /// No relinearization key is present.
    #[error("no relinearization key available")]
    MissingRelinearizationKey,

    /// The caller requested an operation the core intentionally refuses
    /// (e.g. plaintext +/- ciphertext in `Eval` form).
    #[error("unsupported operation: {0}")]
    UnsupportedHeOperation(&'static str),

    /// Prime generation failed, or a modulus otherwise fails to satisfy its invariants.
    #[error("invalid modulus: {0}")]
    InvalidModulus(&'static str),

    /// An empty modulus list was passed where at least one modulus is required.
    #[error("modulus list must not be empty")]
    EmptyModulus,

    /// A signed encoder received a value outside `[-floor(t/2), floor((t-1)/2)]`.
    #[error("encoded value out of bounds for plaintext modulus")]
    EncodingDataOutOfBounds,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HeError>;

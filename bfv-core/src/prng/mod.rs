//! Two randomness roles, kept deliberately separate per §4.9: a
//! deterministic, reseedable generator for the *public* half of a fresh
//! ciphertext (so it can be regenerated from its seed instead of stored),
//! and a buffered OS-backed generator for *secret* material (errors, ternary
//! secrets), which must never be reproducible.

pub mod buffered;
pub mod ctr_drbg;
pub mod samplers;

pub use buffered::BufferedRng;
pub use ctr_drbg::CtrDrbg;

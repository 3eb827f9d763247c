//! RNS-BFV lattice homomorphic encryption core.
//!
//! Implements the Brakerski/Fan-Vercauteren scheme over `R_q = Z_q[X]/(X^N+1)`
//! with an RNS (residue-number-system) representation of the ciphertext
//! modulus chain and the BEHZ multiplication pipeline (lift to an extended
//! base, multiply, and rescale without ever materializing a big-integer
//! modulus).
//!
//! - [`modulus`] / [`bigint`] — single-word and multi-precision modular
//!   arithmetic.
//! - [`ntt`] / [`poly_context`] / [`poly`] — the NTT and the RNS polynomial
//!   type built on top of it, generic over coefficient/evaluation domain.
//! - [`rns`] — RNS base conversion and the BEHZ extend/rescale tool.
//! - [`prng`] — deterministic (`CtrDrbg`) and OS-backed randomness.
//! - [`bfv`] — parameters, contexts, plaintexts, ciphertexts, and the
//!   operation surface (encrypt/decrypt/add/mul/mod-switch).
//! - [`keyswitch`] — secret keys, relinearization, and Galois automorphisms
//!   (row swap, column rotation).
//!
//! `unsafe` is forbidden workspace-wide; every secret-derived buffer
//! (`SecretKey`, fresh-encryption error terms) is zeroized on drop.

pub mod bfv;
pub mod bigint;
pub mod error;
pub mod keyswitch;
pub mod modulus;
pub mod ntt;
pub mod poly;
pub mod poly_context;
pub mod prng;
pub mod rns;

pub use bfv::{BfvMultiplicator, Ciphertext, Context, ParameterSet, Plaintext, SecurityLevel};
pub use error::{HeError, Result};
pub use keyswitch::{GaloisKey, KeySwitchKey, SecretKey};

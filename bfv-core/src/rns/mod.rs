//! Residue-number-system base conversion and the BEHZ multiplication helper
//! built on top of it.

pub mod base_converter;
pub mod tool;

use crate::modulus::Modulus;

/// A bare RNS base: an ordered list of moduli and the ring degree they're
/// used with, with no NTT machinery attached.
///
/// Distinct from [`crate::poly_context::PolyContext`], which additionally
/// requires every modulus to be NTT-friendly and carries twiddle tables —
/// a requirement the auxiliary bases used by [`crate::rns::tool::RnsTool`]
/// (the plaintext modulus, `{t, gamma}`, `B_sk`, `m_tilde`) generally don't
/// satisfy, since base-converted polynomials here are only ever manipulated
/// coefficient-wise, never transformed with an NTT.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RnsBase {
    degree: usize,
    moduli: Vec<Modulus>,
}

impl RnsBase {
    pub fn new(degree: usize, moduli: Vec<Modulus>) -> Self {
        Self { degree, moduli }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.moduli.len()
    }

    #[inline]
    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }
}

impl From<&crate::poly_context::PolyContext> for RnsBase {
    fn from(ctx: &crate::poly_context::PolyContext) -> Self {
        Self {
            degree: ctx.degree(),
            moduli: ctx.moduli().to_vec(),
        }
    }
}

//! Fixed-width multi-precision integers used for CRT composition and the
//! lazy inner-product accumulators.
//!
//! Per §9 of the specification ("Big integers"), these are fixed-size
//! unsigned integer types rather than an arbitrary-precision library, so that
//! timing doesn't depend on the magnitude of secret-derived values. Widths
//! are 2x, 4x, 8x, 16x, and 32x the native 64-bit scalar width, built on
//! [`crypto_bigint`]'s `Uint<LIMBS>` (the same crate `nulltea-bfv`'s
//! key-switching code reaches for when it needs constant-time wide integers).

use crypto_bigint::{Encoding, NonZero, Zero, U1024, U2048, U256, U512};

use crate::modulus::Modulus;

/// 2x the scalar width (128 bits). Native `u128` suffices and is constant-time
/// on every target Rust supports, so it is used directly rather than wrapping
/// it in a `crypto_bigint::Uint`.
pub type U128 = u128;
/// 4x the scalar width (256 bits).
pub type Wide256 = U256;
/// 8x the scalar width (512 bits).
pub type Wide512 = U512;
/// 16x the scalar width (1024 bits).
pub type Wide1024 = U1024;
/// 32x the scalar width (2048 bits), the widest width this crate uses —
/// enough to hold the product of 32 62-bit moduli with headroom.
pub type Wide2048 = U2048;

/// A fixed-width multi-precision unsigned integer, constant-time in the
/// operations this crate needs from it.
///
/// Implemented for [`U128`] and the `crypto_bigint` aliases above. Callers
/// pick the narrowest width that can hold their largest intermediate value
/// (see [`crate::rns::base_converter::RnsBaseConverter::compose_max_intermediate_value`]).
pub trait MultiPrecisionInt:
    Copy + Clone + core::fmt::Debug + PartialEq + Eq + Default
{
    /// `self + rhs`, wrapping on overflow (callers size the width so this
    /// never actually overflows for values that matter).
    fn add_wide(self, rhs: Self) -> Self;
    /// `self - rhs`, wrapping on underflow.
    fn sub_wide(self, rhs: Self) -> Self;
    /// `self * rhs`, truncated to this type's width. Use a wider
    /// [`MultiPrecisionInt`] if the true product doesn't fit.
    fn mul_wide(self, rhs: Self) -> Self;
    /// Builds a value of this width from a `u64`.
    fn from_u64(v: u64) -> Self;
    /// Reduces `self` modulo `m` via Barrett-style repeated reduction,
    /// returning a value `< m.value()`.
    ///
    /// This is implemented with plain division rather than a true
    /// Barrett step for the wide types, because `crypto_bigint`'s
    /// constant-time division is already the primitive we'd build Barrett
    /// reduction out of; using it directly keeps this module small while
    /// preserving the constant-time contract (division time here depends
    /// only on the *widths* involved, not on the values).
    fn reduce_mod(self, m: &Modulus) -> u64;
    /// Whether this value is zero, checked without branching on the value.
    fn ct_is_zero(self) -> bool;
    /// `self mod modulus`, where `modulus` is itself a value of this width
    /// (as opposed to [`MultiPrecisionInt::reduce_mod`], which reduces
    /// against a single machine-word [`Modulus`]). Used by CRT composition,
    /// where the modulus is the product of an entire RNS base and so does
    /// not fit in a `u64`.
    fn rem_wide(self, modulus: Self) -> Self;
}

impl MultiPrecisionInt for U128 {
    fn add_wide(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
    fn sub_wide(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }
    fn mul_wide(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }
    fn from_u64(v: u64) -> Self {
        v as u128
    }
    fn reduce_mod(self, m: &Modulus) -> u64 {
        m.reduce_u128(self)
    }
    fn ct_is_zero(self) -> bool {
        self == 0
    }
    fn rem_wide(self, modulus: Self) -> Self {
        self % modulus
    }
}

macro_rules! impl_wide {
    ($ty:ty) => {
        impl MultiPrecisionInt for $ty {
            fn add_wide(self, rhs: Self) -> Self {
                self.wrapping_add(&rhs)
            }
            fn sub_wide(self, rhs: Self) -> Self {
                self.wrapping_sub(&rhs)
            }
            fn mul_wide(self, rhs: Self) -> Self {
                self.wrapping_mul(&rhs)
            }
            fn from_u64(v: u64) -> Self {
                Self::from(v)
            }
            fn reduce_mod(self, m: &Modulus) -> u64 {
                let divisor = NonZero::new(Self::from(m.value())).expect("modulus is non-zero");
                let remainder = self % divisor;
                let bytes = remainder.to_le_bytes();
                let mut out = [0u8; 8];
                out.copy_from_slice(&bytes.as_ref()[..8]);
                u64::from_le_bytes(out)
            }
            fn ct_is_zero(self) -> bool {
                bool::from(Zero::is_zero(&self))
            }
            fn rem_wide(self, modulus: Self) -> Self {
                let divisor = NonZero::new(modulus).expect("modulus is non-zero");
                self % divisor
            }
        }
    };
}

impl_wide!(Wide256);
impl_wide!(Wide512);
impl_wide!(Wide1024);
impl_wide!(Wide2048);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn u128_reduce_matches_modulus() {
        let m = Modulus::new(97).unwrap();
        let x: u128 = 12345;
        assert_eq!(x.reduce_mod(&m), 12345 % 97);
    }

    #[test]
    fn wide256_reduce_matches_u64_arithmetic() {
        let m = Modulus::new(1_099_511_627_791).unwrap();
        let x = Wide256::from_u64(123_456_789_012_345);
        assert_eq!(x.reduce_mod(&m), 123_456_789_012_345u64 % m.value());
    }
}

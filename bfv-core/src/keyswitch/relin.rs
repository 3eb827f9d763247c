//! Relinearization: collapsing a 3-polynomial ciphertext product back down
//! to 2 polynomials by key-switching its `c2` term from `s^2` back to `s`.

use rand::RngCore;

use crate::bfv::ciphertext::Ciphertext;
use crate::bfv::context::Context;
use crate::error::{HeError, Result};
use crate::keyswitch::ksk::{compute_key_switching_update, generate_key_switch_key, KeySwitchKey};
use crate::keyswitch::secret_key::SecretKey;
use crate::poly::Coeff;

/// Generates the relinearization key: a key switch from `s^2` to `s`.
pub fn generate_relinearization_key(context: &Context, sk: &SecretKey, rng: &mut impl RngCore) -> Result<KeySwitchKey> {
    let s2 = sk.squared()?;
    generate_key_switch_key(context, &s2, sk, rng)
}

/// Collapses a fresh ciphertext product `(c0, c1, c2)` to `(c0', c1')` by
/// switching `c2`'s contribution from `s^2` back to `s`.
pub fn relinearize(context: &Context, ct: &Ciphertext<Coeff>, rlk: &KeySwitchKey) -> Result<Ciphertext<Coeff>> {
    if ct.poly_count() != 3 {
        return Err(HeError::InvalidCiphertext("relinearize expects a 3-polynomial ciphertext product"));
    }
    if ct.correction_factor() != 1 {
        return Err(HeError::InvalidCorrectionFactor(ct.correction_factor()));
    }

    let (d0, d1) = compute_key_switching_update(context, &ct.polys()[2], rlk)?;

    let mut c0 = ct.polys()[0].clone();
    c0.add_assign(&d0)?;
    let mut c1 = ct.polys()[1].clone();
    c1.add_assign(&d1)?;

    Ciphertext::new(context.ciphertext_context().clone(), vec![c0, c1], ct.correction_factor(), None)
}

//! The BFV operation surface (§4.7): encryption, decryption, homomorphic
//! add/sub/mul, modulus switching, inner products, and noise-budget
//! estimation.
//!
//! Operations are free functions over [`Context`]/[`SecretKey`]/[`Ciphertext`]
//! rather than methods on a `BfvScheme` type, matching the functional,
//! pure-over-immutable-inputs style the teacher's `primitives::yashe` module
//! uses for its own `encrypt`/`decrypt` pair.

use crypto_bigint::Encoding;
use rand::RngCore;

use crate::bfv::ciphertext::Ciphertext;
use crate::bfv::context::Context;
use crate::bfv::plaintext::Plaintext;
use crate::bigint::{MultiPrecisionInt, Wide2048};
use crate::error::{HeError, Result};
use crate::keyswitch::secret_key::SecretKey;
use crate::poly::{Coeff, Eval, PolyRq};
use crate::prng::samplers::sample_centered_binomial;
use crate::prng::CtrDrbg;

/// Which direction a plaintext translation moves the ciphertext.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaintextOp {
    Add,
    Sub,
}

fn signed_to_residue(v: i64, qi: &crate::modulus::Modulus) -> u64 {
    v.rem_euclid(qi.value() as i64) as u64
}

/// Encrypts the zero plaintext: `(c0, c1) = (-(a*s) + e, a)`, with `a` drawn
/// from a seeded deterministic PRNG (so it need not be stored) and `e` from
/// the host-backed `rng`.
pub fn encrypt_zero(context: &Context, sk: &SecretKey, rng: &mut impl RngCore) -> Result<Ciphertext<Coeff>> {
    let poly_context = context.ciphertext_context();

    let mut seed = [0u8; 16];
    rng.fill_bytes(&mut seed);
    let mut public_rng = CtrDrbg::from_seed(seed);
    let a_eval = PolyRq::<Eval>::random(poly_context, &mut public_rng).with_variable_time();

    let error = sample_centered_binomial(poly_context.degree(), context.params().error_std_dev(), rng);
    let n = poly_context.degree();
    let mut e_coeffs = vec![0u64; poly_context.moduli_count() * n];
    for (row, qi) in poly_context.moduli().iter().enumerate() {
        for (j, &v) in error.iter().enumerate() {
            e_coeffs[row * n + j] = signed_to_residue(v, qi);
        }
    }
    let mut e_coeff = PolyRq::from_coeffs(poly_context, e_coeffs);

    let mut c0_eval = a_eval.clone();
    c0_eval.mul_assign(sk.as_eval())?;
    let mut c0_coeff = c0_eval.inverse_ntt().neg();
    c0_coeff.add_assign(&e_coeff)?;
    e_coeff.zeroize();

    let a_coeff = a_eval.inverse_ntt();

    Ciphertext::new(poly_context.clone(), vec![c0_coeff, a_coeff], 1, Some(seed))
}

/// `encrypt_zero` plus a plaintext translation: a fresh encryption of `pt`.
pub fn encrypt(context: &Context, sk: &SecretKey, pt: &Plaintext<Coeff>, rng: &mut impl RngCore) -> Result<Ciphertext<Coeff>> {
    let mut ct = encrypt_zero(context, sk, rng)?;
    plaintext_translate(context, &mut ct, pt, PlaintextOp::Add)?;
    Ok(ct)
}

/// Adds (or subtracts) a `Coeff`-form plaintext into `ct`'s first
/// polynomial, scaled by `Delta_i = floor(Q/t) mod q_i` with the usual
/// round-to-nearest correction. Requires `ct.correction_factor() == 1`.
pub fn plaintext_translate(context: &Context, ct: &mut Ciphertext<Coeff>, pt: &Plaintext<Coeff>, op: PlaintextOp) -> Result<()> {
    if ct.correction_factor() != 1 {
        return Err(HeError::InvalidCorrectionFactor(ct.correction_factor()));
    }
    if pt.context() != ct.context() {
        return Err(HeError::IncompatibleCiphertextAndPlaintext);
    }

    let rns_tool = context.rns_tool(ct.context().moduli_count())?;
    let t = context.plaintext_modulus().value();
    let t_threshold = rns_tool.t_threshold();
    let q_mod_t = rns_tool.q_mod_t();
    let delta = rns_tool.q_div_t_mod_qi().to_vec();
    let n = ct.context().degree();
    let moduli = ct.context().moduli().to_vec();

    let c0 = &mut ct.polys_mut()[0];
    for j in 0..n {
        let m = pt.as_slice()[j];
        let adjust = (q_mod_t as u128 * m as u128 + t_threshold as u128) / t as u128;
        for (i, qi) in moduli.iter().enumerate() {
            let scaled = qi.mul_mod_vt(delta[i] % qi.value(), m % qi.value());
            let term = qi.add_mod(scaled, (adjust % qi.value() as u128) as u64);
            let row = c0.row_mut(i);
            row[j] = match op {
                PlaintextOp::Add => qi.add_mod(row[j], term),
                PlaintextOp::Sub => qi.sub_mod(row[j], term),
            };
        }
    }
    ct.clear_seed();
    Ok(())
}

/// Adds a `Coeff`-form plaintext to a ciphertext.
pub fn add_plain(context: &Context, ct: &mut Ciphertext<Coeff>, pt: &Plaintext<Coeff>) -> Result<()> {
    plaintext_translate(context, ct, pt, PlaintextOp::Add)
}

/// Subtracts a `Coeff`-form plaintext from a ciphertext.
pub fn sub_plain(context: &Context, ct: &mut Ciphertext<Coeff>, pt: &Plaintext<Coeff>) -> Result<()> {
    plaintext_translate(context, ct, pt, PlaintextOp::Sub)
}

/// `Eval`-form plaintext +/- ciphertext is not supported: the core refuses
/// it explicitly rather than producing a silently-wrong result.
pub fn add_plain_eval(_ct: &mut Ciphertext<Eval>, _pt: &Plaintext<Eval>) -> Result<()> {
    Err(HeError::UnsupportedHeOperation("plaintext +/- ciphertext is not supported in Eval form"))
}

/// Pointwise `Eval`-form ciphertext-plaintext multiplication: every
/// polynomial of `ct` is multiplied by `pt`, which must share `ct`'s
/// context (and so its `moduli_count`).
pub fn mul_plain_eval(ct: &mut Ciphertext<Eval>, pt: &Plaintext<Eval>) -> Result<()> {
    if pt.context() != ct.context() {
        return Err(HeError::IncompatibleCiphertextAndPlaintext);
    }
    let pt_poly = pt.as_poly();
    for poly in ct.polys_mut() {
        poly.mul_assign(&pt_poly)?;
    }
    ct.clear_seed();
    Ok(())
}

/// `v = sum_i c_i * s^i` in `Eval` form, then rescaled by `RnsTool::scale_and_round`
/// with scaling factor `correction_factor^-1 mod t`.
pub fn decrypt_eval(context: &Context, ct: &Ciphertext<Eval>, sk: &SecretKey) -> Result<Plaintext<Coeff>> {
    let mut acc = ct.polys()[0].clone();
    let mut sk_pow = sk.as_eval().clone();
    for i in 1..ct.poly_count() {
        let mut term = ct.polys()[i].clone();
        term.mul_assign(&sk_pow)?;
        acc.add_assign(&term)?;
        if i + 1 < ct.poly_count() {
            sk_pow.mul_assign(sk.as_eval())?;
        }
    }
    let v_coeff = acc.inverse_ntt();

    let rns_tool = context.rns_tool(ct.context().moduli_count())?;
    let t = context.plaintext_modulus().value();
    let corr_inv = context.plaintext_modulus().inverse_mod(ct.correction_factor() % t)?;
    let rounded = rns_tool.scale_and_round(v_coeff.as_slice(), corr_inv);

    Plaintext::new(context, rounded)
}

/// Forward-NTTs `ct` then decrypts it (see [`decrypt_eval`]).
pub fn decrypt_coeff(context: &Context, ct: &Ciphertext<Coeff>, sk: &SecretKey) -> Result<Plaintext<Coeff>> {
    decrypt_eval(context, &ct.clone().forward_ntt(), sk)
}

/// Lifts both operands into `[Q, B_sk]`, forward-NTTs, and forms the three
/// BEHZ cross products `(c0*c0', c0*c1'+c1*c0', c1*c1')` in the extended
/// base. Both inputs must be fresh (2-polynomial, `correction_factor == 1`)
/// ciphertexts sharing `lhs`'s context.
pub fn multiply_without_scaling(context: &Context, lhs: &Ciphertext<Coeff>, rhs: &Ciphertext<Coeff>) -> Result<Ciphertext<Eval>> {
    if lhs.poly_count() != 2 || rhs.poly_count() != 2 {
        return Err(HeError::InvalidCiphertext("multiplication requires fresh 2-polynomial ciphertexts"));
    }
    if lhs.correction_factor() != 1 || rhs.correction_factor() != 1 {
        return Err(HeError::InvalidCorrectionFactor(lhs.correction_factor()));
    }
    if lhs.context() != rhs.context() {
        return Err(HeError::InvalidContext);
    }

    let rns_tool = context.rns_tool(lhs.context().moduli_count())?;
    let extended_context = rns_tool.extended_context()?;

    let lift = |ct: &Ciphertext<Coeff>| -> Vec<PolyRq<Eval>> {
        ct.polys()
            .iter()
            .map(|p| {
                let lifted = rns_tool.lift_q_to_q_bsk(p.as_slice());
                PolyRq::from_coeffs(&extended_context, lifted).forward_ntt()
            })
            .collect()
    };
    let l = lift(lhs);
    let r = lift(rhs);

    let mut c0 = l[0].clone();
    c0.mul_assign(&r[0])?;
    let mut c1a = l[0].clone();
    c1a.mul_assign(&r[1])?;
    let mut c1b = l[1].clone();
    c1b.mul_assign(&r[0])?;
    c1a.add_assign(&c1b)?;
    let mut c2 = l[1].clone();
    c2.mul_assign(&r[1])?;

    Ciphertext::new(extended_context, vec![c0, c1a, c2], 1, None)
}

/// Scales each extended-base polynomial by `t`, inverse-NTTs, and applies
/// `RnsTool::floor_q_bsk_to_q` — the BEHZ rescale `floor((t/Q)*Q*x) mod Q`
/// that brings a product back down to the plain `Q` base.
pub fn drop_extended_base(context: &Context, ct: Ciphertext<Eval>) -> Result<Ciphertext<Coeff>> {
    let q_count = context.moduli_count();
    let rns_tool = context.rns_tool(q_count)?;
    let t = context.plaintext_modulus().value();
    let correction_factor = ct.correction_factor();
    let ciphertext_context = context.ciphertext_context().clone();

    let mut out_polys = Vec::with_capacity(ct.poly_count());
    for mut poly in ct.into_polys() {
        poly.mul_scalar_assign(t);
        let coeff = poly.inverse_ntt();
        let floored = rns_tool.floor_q_bsk_to_q(coeff.as_slice());
        out_polys.push(PolyRq::from_coeffs(&ciphertext_context, floored));
    }
    Ciphertext::new(ciphertext_context, out_polys, correction_factor, None)
}

/// `multiply_without_scaling` + `drop_extended_base`: a fresh 3-polynomial
/// ciphertext product that still needs `relinearize` (§4.8) to return to
/// 2 polynomials.
#[tracing::instrument(skip_all)]
pub fn mul_assign(context: &Context, lhs: &Ciphertext<Coeff>, rhs: &Ciphertext<Coeff>) -> Result<Ciphertext<Coeff>> {
    let product = multiply_without_scaling(context, lhs, rhs)?;
    drop_extended_base(context, product)
}

/// Drops the last ciphertext modulus, rounding each remaining coefficient.
/// Requires `correction_factor == 1`.
pub fn mod_switch_down(ct: &Ciphertext<Coeff>) -> Result<Ciphertext<Coeff>> {
    if ct.correction_factor() != 1 {
        return Err(HeError::InvalidCorrectionFactor(ct.correction_factor()));
    }
    let new_context = ct
        .context()
        .next()
        .ok_or(HeError::InvalidCiphertext("cannot mod-switch down from a single-modulus context"))?
        .clone();
    let polys = ct.polys().iter().map(|p| p.divide_and_round_q_last()).collect();
    Ciphertext::new(new_context, polys, 1, None)
}

/// Repeats [`mod_switch_down`] until a single modulus remains.
pub fn mod_switch_down_to_single(ct: &Ciphertext<Coeff>) -> Result<Ciphertext<Coeff>> {
    let mut current = ct.clone();
    while current.context().moduli_count() > 1 {
        current = mod_switch_down(&current)?;
    }
    Ok(current)
}

/// `sum_i lhs_i * rhs_i`, via repeated [`multiply_without_scaling`] and
/// `Eval`-form accumulation before a single [`drop_extended_base`] at the
/// end. Requires at least one pair and matched lengths.
pub fn inner_product_ciphertexts(context: &Context, lhs: &[Ciphertext<Coeff>], rhs: &[Ciphertext<Coeff>]) -> Result<Ciphertext<Coeff>> {
    if lhs.is_empty() || lhs.len() != rhs.len() {
        return Err(HeError::InvalidCiphertext("inner product requires matched non-empty ciphertext vectors"));
    }
    let mut acc: Option<Ciphertext<Eval>> = None;
    for (a, b) in lhs.iter().zip(rhs.iter()) {
        let product = multiply_without_scaling(context, a, b)?;
        acc = Some(match acc {
            None => product,
            Some(mut running) => {
                running.add_assign(&product)?;
                running
            }
        });
    }
    drop_extended_base(context, acc.expect("checked non-empty above"))
}

/// `sum_i cts_i * pts_i` over matched `Eval`-form ciphertexts and (optional)
/// plaintexts; a `None` term is skipped. Requires at least one present term.
pub fn inner_product_ciphertext_plaintexts(cts: &[Ciphertext<Eval>], pts: &[Option<Plaintext<Eval>>]) -> Result<Ciphertext<Eval>> {
    if cts.len() != pts.len() {
        return Err(HeError::InvalidCiphertext("inner product requires matched ciphertext/plaintext vectors"));
    }
    let mut acc: Option<Ciphertext<Eval>> = None;
    for (ct, pt_opt) in cts.iter().zip(pts.iter()) {
        let Some(pt) = pt_opt else { continue };
        let mut scaled = ct.clone();
        mul_plain_eval(&mut scaled, pt)?;
        acc = Some(match acc {
            None => scaled,
            Some(mut running) => {
                running.add_assign(&scaled)?;
                running
            }
        });
    }
    acc.ok_or(HeError::InvalidCiphertext("inner product requires at least one present plaintext term"))
}

/// Multiplies every polynomial of `ct` by `X^k` in `R_q` (cyclic, sign-flip
/// on wraparound). `k` may be negative or `>= N`.
pub fn multiply_power_of_x(ct: &mut Ciphertext<Coeff>, k: i64) {
    ct.multiply_power_of_x(k);
}

fn bit_length_bytes(bytes: &[u8]) -> u32 {
    for (i, &b) in bytes.iter().enumerate().rev() {
        if b != 0 {
            return (i as u32) * 8 + (8 - b.leading_zeros());
        }
    }
    0
}

/// `log2(Q / (2 * ||v*t||_inf))`, where `v = sum_i c_i*s^i` — the number of
/// noise bits still available before decryption becomes unreliable.
///
/// CRT-composes through [`Wide2048`] unconditionally rather than picking the
/// narrowest width [`crate::rns::base_converter::RnsBaseConverter::compose_max_intermediate_value`]
/// would allow: `Wide2048` comfortably covers every modulus chain this crate's
/// named parameter sets use, and the extra width costs nothing but a few
/// spare limbs. This is the one variable-time path in the noise-budget
/// computation (no constant-time wide multiply is assumed), consistent with
/// `noise_budget_eval`'s contract in the core specification.
pub fn noise_budget_eval(context: &Context, ct: &Ciphertext<Coeff>, sk: &SecretKey) -> Result<f64> {
    let eval = ct.clone().forward_ntt();
    let mut acc = eval.polys()[0].clone();
    let mut sk_pow = sk.as_eval().clone();
    for i in 1..eval.poly_count() {
        let mut term = eval.polys()[i].clone();
        term.mul_assign(&sk_pow)?;
        acc.add_assign(&term)?;
        if i + 1 < eval.poly_count() {
            sk_pow.mul_assign(sk.as_eval())?;
        }
    }
    let mut v_coeff = acc.inverse_ntt();
    v_coeff.mul_scalar_assign(context.plaintext_modulus().value());

    let rns_tool = context.rns_tool(ct.context().moduli_count())?;
    let composed: Vec<Wide2048> = rns_tool.crt_compose(v_coeff.as_slice());

    let q_total = ct
        .context()
        .moduli()
        .iter()
        .fold(Wide2048::from_u64(1), |acc, q| acc.mul_wide(Wide2048::from_u64(q.value())));

    let mut max_bits = 0u32;
    for v in composed {
        let doubled = v.add_wide(v);
        let magnitude = if doubled > q_total { q_total.sub_wide(v) } else { v };
        let bytes = magnitude.to_le_bytes();
        max_bits = max_bits.max(bit_length_bytes(bytes.as_ref()));
    }

    let q_bits: u32 = ct.context().moduli().iter().map(|q| q.bits()).sum();
    let budget = q_bits as f64 - 1.0 - max_bits as f64;
    tracing::trace!(budget, "noise budget estimated");
    Ok(budget)
}

//! Coefficient samplers shared by key generation and encryption: uniform
//! rejection sampling, ternary secrets, and centered-binomial error terms.

use rand::RngCore;

use crate::modulus::Modulus;

/// Draws a uniform value in `[0, modulus)` by rejection sampling on
/// `ceil(log2(q))` bits at a time, so the distribution stays exactly
/// uniform rather than introducing the bias a plain `% q` would.
pub fn sample_uniform(modulus: &Modulus, rng: &mut impl RngCore) -> u64 {
    let mask = (1u64 << modulus.bits()) - 1;
    loop {
        let candidate = rng.next_u64() & mask;
        if candidate < modulus.value() {
            return candidate;
        }
    }
}

/// Draws `n` ternary values in `{-1, 0, 1}`, each from two uniform bits with
/// the `11` pattern rejected (`00 -> 0, 01 -> 1, 10 -> -1`), so all three
/// outcomes remain equally likely.
pub fn sample_ternary(n: usize, rng: &mut impl RngCore) -> Vec<i8> {
    let mut out = Vec::with_capacity(n);
    let mut bits: u64 = 0;
    let mut bits_left: u32 = 0;
    while out.len() < n {
        if bits_left < 2 {
            bits = rng.next_u64();
            bits_left = 64;
        }
        let two = bits & 0b11;
        bits >>= 2;
        bits_left -= 2;
        match two {
            0b00 => out.push(0),
            0b01 => out.push(1),
            0b10 => out.push(-1),
            _ => {}
        }
    }
    out
}

/// Draws `n` centered-binomial error terms with the given standard
/// deviation: each term is the difference of two independent sums of
/// `eta = round(2*sigma^2)` Bernoulli coin flips, which approximates a
/// discrete Gaussian of variance `sigma^2` closely enough for BFV noise
/// analysis and is far cheaper to sample exactly.
pub fn sample_centered_binomial(n: usize, std_dev: f64, rng: &mut impl RngCore) -> Vec<i64> {
    let eta = (2.0 * std_dev * std_dev).round().max(1.0) as u32;
    (0..n)
        .map(|_| {
            let a = sample_bit_sum(eta, rng);
            let b = sample_bit_sum(eta, rng);
            a as i64 - b as i64
        })
        .collect()
}

fn sample_bit_sum(count: u32, rng: &mut impl RngCore) -> u32 {
    let mut total = 0u32;
    let mut remaining = count;
    while remaining > 0 {
        let take = remaining.min(32);
        let word = rng.next_u32();
        let mask = if take == 32 { u32::MAX } else { (1u32 << take) - 1 };
        total += (word & mask).count_ones();
        remaining -= take;
    }
    total
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn uniform_samples_stay_in_range() {
        let q = Modulus::new(97).unwrap();
        let mut rng = thread_rng();
        for _ in 0..1000 {
            assert!(sample_uniform(&q, &mut rng) < 97);
        }
    }

    #[test]
    fn ternary_samples_are_in_range() {
        let mut rng = thread_rng();
        let samples = sample_ternary(1000, &mut rng);
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|&v| (-1..=1).contains(&v)));
        assert!(samples.iter().any(|&v| v == -1));
        assert!(samples.iter().any(|&v| v == 1));
    }

    #[test]
    fn centered_binomial_is_bounded_by_eta() {
        let mut rng = thread_rng();
        let std_dev = 3.2;
        let eta = (2.0 * std_dev * std_dev).round() as i64;
        let samples = sample_centered_binomial(1000, std_dev, &mut rng);
        assert!(samples.iter().all(|&v| v.abs() <= eta));
    }
}

//! AES-128 CTR_DRBG without a derivation function, per NIST SP 800-90A
//! §10.2.1 — the public, deterministic generator behind a ciphertext's
//! recorded `seed`.
//!
//! `seedlen = keylen + blocklen = 256` bits for AES-128, so the "no
//! derivation function" variant can take the full 32-byte entropy input
//! directly as seed material with no hashing step, which keeps this module
//! small and its key schedule branch-free.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::{Error, RngCore};

const KEY_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const SEED_LEN: usize = KEY_LEN + BLOCK_LEN;

/// A NIST SP 800-90A AES-128 CTR_DRBG (no df, no prediction resistance, no
/// additional input on generate).
#[derive(Clone)]
pub struct CtrDrbg {
    key: [u8; KEY_LEN],
    v: [u8; BLOCK_LEN],
}

impl CtrDrbg {
    /// Instantiates from 32 bytes of entropy, used directly as seed material
    /// (no derivation function, matching `seedlen == entropy input length`).
    pub fn new(entropy: &[u8; SEED_LEN]) -> Self {
        let (key, v) = ctr_drbg_update(entropy, &[0u8; KEY_LEN], &[0u8; BLOCK_LEN]);
        Self { key, v }
    }

    /// Instantiates from a 128-bit ciphertext seed, padding it out to the
    /// full 32-byte entropy input with zeros. Used when recomputing a
    /// ciphertext's `a` polynomial from its stored seed.
    pub fn from_seed(seed: [u8; 16]) -> Self {
        let mut entropy = [0u8; SEED_LEN];
        entropy[..16].copy_from_slice(&seed);
        Self::new(&entropy)
    }

    /// Fills `out` with the next `out.len()` generated bytes, then performs
    /// the mandatory post-generate update (NIST 10.2.1.2 step 6, with a
    /// null additional input).
    pub fn generate(&mut self, out: &mut [u8]) {
        let mut produced = 0;
        while produced < out.len() {
            increment_counter(&mut self.v);
            let block = encrypt_block(&self.key, &self.v);
            let take = (out.len() - produced).min(BLOCK_LEN);
            out[produced..produced + take].copy_from_slice(&block[..take]);
            produced += take;
        }
        let (key, v) = ctr_drbg_update(&[0u8; SEED_LEN], &self.key, &self.v);
        self.key = key;
        self.v = v;
    }
}

impl RngCore for CtrDrbg {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.generate(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.generate(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.generate(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// `CTR_DRBG_Update`: re-keys from `seedlen` bytes of fresh keystream XORed
/// with `provided_data`.
fn ctr_drbg_update(
    provided_data: &[u8; SEED_LEN],
    key: &[u8; KEY_LEN],
    v: &[u8; BLOCK_LEN],
) -> ([u8; KEY_LEN], [u8; BLOCK_LEN]) {
    let mut temp = [0u8; SEED_LEN];
    let mut v_local = *v;
    for chunk in temp.chunks_mut(BLOCK_LEN) {
        increment_counter(&mut v_local);
        let block = encrypt_block(key, &v_local);
        chunk.copy_from_slice(&block);
    }
    for (t, p) in temp.iter_mut().zip(provided_data.iter()) {
        *t ^= p;
    }
    let mut new_key = [0u8; KEY_LEN];
    let mut new_v = [0u8; BLOCK_LEN];
    new_key.copy_from_slice(&temp[..KEY_LEN]);
    new_v.copy_from_slice(&temp[KEY_LEN..]);
    (new_key, new_v)
}

fn increment_counter(v: &mut [u8; BLOCK_LEN]) {
    for byte in v.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

fn encrypt_block(key: &[u8; KEY_LEN], v: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut block = *GenericArray::from_slice(v);
    cipher.encrypt_block(&mut block);
    block.into()
}

#[cfg(test)]
mod test {
    use super::*;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn generate_is_deterministic_for_a_given_seed() {
        let entropy = [7u8; SEED_LEN];
        let mut a = CtrDrbg::new(&entropy);
        let mut b = CtrDrbg::new(&entropy);
        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.generate(&mut out_a);
        b.generate(&mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn second_generate_call_differs_from_first() {
        let entropy = [7u8; SEED_LEN];
        let mut drbg = CtrDrbg::new(&entropy);
        let mut first = [0u8; 64];
        let mut second = [0u8; 64];
        drbg.generate(&mut first);
        drbg.generate(&mut second);
        assert_ne!(first, second);
    }

    #[test]
    fn nist_ctr_drbg_vector() {
        let entropy_hex = "69a09f6bf5dda15cd4af29e14cf5e0cddd7d07ac39bba587f8bc331104f9c448";
        let entropy_bytes = hex_to_bytes(&entropy_hex[..64]);
        let mut entropy = [0u8; SEED_LEN];
        entropy.copy_from_slice(&entropy_bytes);

        let mut drbg = CtrDrbg::new(&entropy);
        let mut first = [0u8; 64];
        drbg.generate(&mut first);
        let mut second = [0u8; 64];
        drbg.generate(&mut second);

        let expected = hex_to_bytes(
            "f78a4919a6ec899f7b6c69381febbbe083315f3d289e70346db0e4ec4360473ae0b3d916e9b6b964309f753ed66ae59de48da316cc1944bc8dfd0e2575d0ff6d",
        );
        assert_eq!(second.to_vec(), expected);
    }
}

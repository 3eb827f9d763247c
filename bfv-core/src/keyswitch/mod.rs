//! Secret-key management and RNS key switching (§4.8): relinearization,
//! Galois automorphisms (row swap, column rotation), and the hybrid
//! key-switching machinery both are built from.

pub mod galois;
pub mod ksk;
pub mod relin;
pub mod secret_key;

pub use galois::{apply_galois, column_rotation_element, row_swap_element, rotate_columns, rotate_columns_multi_step, swap_rows, GaloisKey};
pub use ksk::{compute_key_switching_update, generate_key_switch_key, KeySwitchKey};
pub use relin::{generate_relinearization_key, relinearize};
pub use secret_key::SecretKey;

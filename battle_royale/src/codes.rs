//! Join code generation.

use rand::Rng;

/// Characters allowed in join codes. Ambiguous glyphs (I, O, 0, 1) are left out.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a generated join code
pub const CODE_LENGTH: usize = 6;

/// Generate a random, human-typeable join code.
///
/// Uniqueness is not guaranteed here; the store rejects clashing codes and
/// the caller retries with a fresh one.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::rng())
}

/// Generate a join code from the given RNG
pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize user-entered codes before lookup
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

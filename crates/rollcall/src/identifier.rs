//! Student identifier generation.

use rand::Rng;

/// Characters a random suffix is drawn from.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 5;

/// Build `<roll>_<suffix>` with a suffix drawn uniformly, with replacement,
/// from [`ALPHABET`].
///
/// No uniqueness check happens here.
pub fn generate_identifier<R: Rng + ?Sized>(roll: &str, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    format!("{roll}_{suffix}")
}

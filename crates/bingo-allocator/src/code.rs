//! Player codes.

use rand::Rng;

/// Upper-case letters and digits minus the look-alikes `0`, `O`, `1`, `I`.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Draws a random code of `length` characters from [`CODE_ALPHABET`].
///
/// Uniqueness is the caller's job: the round actor checks each draw
/// against the round's existing codes.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

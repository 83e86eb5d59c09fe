use rand::Rng;

/// Longest secret the interactive and CLI generators will produce.
pub const MAX_LENGTH: usize = 4096;

/// A string of exactly `len` ASCII letters and digits.
///
/// Bytes are drawn uniformly from `'0'..='z'` and redrawn when they land in
/// the punctuation between the digit and letter ranges.
pub fn random_alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut out = String::with_capacity(len.min(MAX_LENGTH));
    while out.len() < len {
        let byte = rng.gen_range(b'0'..=b'z');
        if byte.is_ascii_alphanumeric() {
            out.push(char::from(byte));
        }
    }
    out
}

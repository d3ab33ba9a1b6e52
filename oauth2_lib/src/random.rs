use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the strings produced by [`new_state`].
pub const STATE_LENGTH: usize = 32;

/// Generates a random alphanumeric string of the given length.
pub fn random_alphanumeric_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Generates an opaque value suitable for the OAuth `state` parameter.
pub fn new_state() -> String {
    random_alphanumeric_string(STATE_LENGTH)
}

// ABOUTME: Shared utility functions for Flowbox
// ABOUTME: Random identifier generation for runs and cache keys

use crate::constants::ID_LENGTH;

/// Generate a random platform identifier (21 alphanumeric characters)
pub fn generate_id() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

//! Benchmark utilities.

use rand::Rng;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` distinct keys with a shared prefix.
pub fn generate_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("bench-key-{i:08}").into_bytes())
        .collect()
}

/// Generate key/value pairs with the specified payload size.
pub fn generate_pairs(count: usize, payload_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    generate_keys(count)
        .into_iter()
        .map(|key| (key, random_data(payload_size)))
        .collect()
}

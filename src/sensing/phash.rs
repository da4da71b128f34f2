use anyhow::Result;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Perceptual fingerprint of an encoded frame (any format `image` can decode).
pub fn compute_phash(image_bytes: &[u8]) -> Result<String> {
    let img = image::load_from_memory(image_bytes)?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    Ok(hasher.hash_image(&img).to_base64())
}

pub fn compute_hamming_distance(lhs: &str, rhs: &str) -> u32 {
    let Ok(h1) = ImageHash::<Vec<u8>>::from_base64(lhs) else {
        return u32::MAX;
    };
    let Ok(h2) = ImageHash::<Vec<u8>>::from_base64(rhs) else {
        return u32::MAX;
    };
    h1.dist(&h2)
}

/// True when `current` is within `threshold` bits of the previous fingerprint.
pub fn is_unchanged(previous: Option<&str>, current: &str, threshold: u32) -> bool {
    previous
        .map(|prev| compute_hamming_distance(prev, current) < threshold)
        .unwrap_or(false)
}

//! Deterministic price variation.
//!
//! Factors come from a BLAKE3 digest of the seed and the resource identity,
//! never from the clock or an RNG, so identical inputs always vary the same
//! way while different resources land on different prices.

use costsource_types::ResourceDescriptor;

/// Maximum relative deviation from a base price.
pub const MAX_VARIATION: f64 = 0.4;

/// Map arbitrary key parts to a value in `[0, 1)`.
pub fn unit_interval(seed: u64, parts: &[&str]) -> f64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    for part in parts {
        hasher.update(part.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update(&[0x1f]);
    }
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    // 53 significant bits fit an f64 mantissa exactly.
    (u64::from_le_bytes(word) >> 11) as f64 / (1u64 << 53) as f64
}

/// Factor in `[1 - MAX_VARIATION, 1 + MAX_VARIATION)` for the key parts.
pub fn factor(seed: u64, parts: &[&str]) -> f64 {
    1.0 + (unit_interval(seed, parts) * 2.0 - 1.0) * MAX_VARIATION
}

/// Variation factor for a resource. Tags do not take part.
pub fn resource_factor(seed: u64, resource: &ResourceDescriptor) -> f64 {
    let provider = resource.provider.to_ascii_lowercase();
    let resource_type = resource.resource_type.to_ascii_lowercase();
    factor(
        seed,
        &[
            provider.as_str(),
            resource_type.as_str(),
            resource.sku.as_str(),
            resource.region.as_str(),
        ],
    )
}

/// Round to six decimal places so repeated renderings compare equal.
pub fn round_price(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_is_bounded() {
        for i in 0..1000 {
            let n = i.to_string();
            let f = factor(7, &["aws", "ec2", n.as_str()]);
            assert!((0.6..1.4).contains(&f), "factor {} out of range", f);
        }
    }

    #[test]
    fn factor_is_stable() {
        let r = ResourceDescriptor::new("aws", "ec2").with_region("us-east-1");
        assert_eq!(resource_factor(42, &r), resource_factor(42, &r));
    }

    #[test]
    fn seed_and_identity_change_the_factor() {
        let a = ResourceDescriptor::new("aws", "ec2").with_region("us-east-1");
        let b = ResourceDescriptor::new("aws", "ec2").with_region("eu-west-1");
        assert_ne!(resource_factor(1, &a), resource_factor(1, &b));
        assert_ne!(resource_factor(1, &a), resource_factor(2, &a));
    }

    #[test]
    fn tags_do_not_change_the_factor() {
        let a = ResourceDescriptor::new("gcp", "compute");
        let b = a.clone().with_tag("team", "payments");
        assert_eq!(resource_factor(1, &a), resource_factor(1, &b));
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        assert_ne!(unit_interval(0, &["ab", "c"]), unit_interval(0, &["a", "bc"]));
    }
}

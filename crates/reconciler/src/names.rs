//! Generates a human-facing resource name when a backend's `create` does not
//! return one. Not required to be unique (§3 of the design docs): two
//! resources may share a name, callers key off `id`.

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "cedar", "dusky", "ember", "fleet", "gilt", "hazel", "iron", "jade", "keen",
    "lucid", "misty", "noble", "opal", "plume", "quiet", "russet", "sable", "terse",
];

const NOUNS: &[&str] = &[
    "falcon", "harbor", "ridge", "summit", "cove", "grove", "meadow", "forge", "anchor", "lattice",
    "cascade", "thicket", "beacon", "quarry", "canyon", "atlas", "orbit", "marsh", "delta", "spire",
];

/// Builds a `<adjective>-<noun>-<n>` name from the process RNG, e.g.
/// `misty-ridge-7241`. Deterministic-enough-for-humans, not collision-free.
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let suffix: u16 = rng.gen_range(1000..10000);
    format!("{adjective}-{noun}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_three_hyphenated_parts() {
        let name = random_name();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[2].parse::<u16>().is_ok());
    }
}

use base64::Engine;
use rand::RngCore;

/// Source of opaque random tokens.
pub trait SecretGenerator: Send + Sync {
    fn generate(&self, length_bytes: usize) -> String;
}

pub struct RandomSecretGenerator;

impl RandomSecretGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SecretGenerator for RandomSecretGenerator {
    fn generate(&self, length_bytes: usize) -> String {
        let mut bytes = vec![0u8; length_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Lowercase hex, used for admin-created accounts submitted without a password.
pub fn random_hex(length_bytes: usize) -> String {
    let mut bytes = vec![0u8; length_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_url_safe_and_distinct() {
        let generator = RandomSecretGenerator::new();
        let a = generator.generate(20);
        let b = generator.generate(20);
        assert_eq!(a.len(), 27);
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn random_hex_has_two_chars_per_byte() {
        let value = random_hex(12);
        assert_eq!(value.len(), 24);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

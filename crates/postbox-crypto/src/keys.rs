use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;

/// Generate a random 256-bit secret for signing session tokens.
pub fn generate_session_secret() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rng().fill(&mut key);
    key
}

/// Encode a secret to base64 for config files and env vars.
pub fn secret_to_base64(key: &[u8; 32]) -> String {
    BASE64.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_random() {
        assert_ne!(generate_session_secret(), generate_session_secret());
    }

    #[test]
    fn encoded_secret_is_padded_base64() {
        let encoded = secret_to_base64(&[7u8; 32]);
        assert_eq!(encoded.len(), 44);
        assert_eq!(BASE64.decode(&encoded).unwrap(), vec![7u8; 32]);
    }
}

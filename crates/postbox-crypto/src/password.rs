use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha512;
use subtle::ConstantTimeEq;

const ITERATIONS: u32 = 10_000;
const KEY_LEN: usize = 64;
const SALT_LEN: usize = 16;

/// Hash a password with PBKDF2-HMAC-SHA512 and a fresh random salt.
/// Returns `hex(derived_key):hex(salt)`.
///
/// The salt's hex text (not the raw bytes) is what goes into the KDF, so
/// hashes stay interchangeable with rows written before this service.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt);
    let salt_hex = hex::encode(salt);

    let derived = derive_key(password, &salt_hex);
    format!("{}:{}", hex::encode(derived), salt_hex)
}

/// Verify a password against a stored `hash:salt` string.
/// A malformed stored value verifies as false.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split(':');
    let (Some(hash), Some(salt)) = (parts.next(), parts.next()) else {
        return false;
    };
    if hash.is_empty() || salt.is_empty() {
        return false;
    }

    let candidate = hex::encode(derive_key(password, salt));
    candidate.as_bytes().ct_eq(hash.as_bytes()).into()
}

fn derive_key(password: &str, salt: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), ITERATIONS, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_has_expected_shape() {
        let stored = hash_password("correct horse");
        let (hash, salt) = stored.split_once(':').unwrap();

        assert_eq!(hash.len(), KEY_LEN * 2);
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert!(stored.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn verifies_only_the_original_password() {
        let stored = hash_password("correct horse");

        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("correct horse ", &stored));
        assert!(!verify_password("Correct horse", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("pw123456"), hash_password("pw123456"));
    }

    #[test]
    fn malformed_stored_hash_is_false() {
        for stored in ["", "abc", ":deadbeef", "deadbeef:", ":"] {
            assert!(!verify_password("anything", stored), "{stored:?}");
        }
    }

    #[test]
    fn known_vector_uses_salt_text() {
        // PBKDF2-HMAC-SHA512("password", "salt", 10000, 64)
        let stored = format!("{}:salt", hex::encode(derive_key("password", "salt")));
        assert!(verify_password("password", &stored));
        assert!(!verify_password("password", &stored.replace(":salt", ":SALT")));
    }
}

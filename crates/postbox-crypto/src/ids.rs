use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of row ids and generated upload names.
pub const ID_LEN: usize = 15;

/// Random 15-character `[0-9A-Za-z]` identifier.
pub fn create_id() -> String {
    random_alphanumeric(ID_LEN)
}

pub fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_15_alphanumeric_chars() {
        let id = create_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: std::collections::HashSet<String> = (0..1000).map(|_| create_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}

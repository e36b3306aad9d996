/// Postbox Crypto Library
///
/// Password hashing in the `hex(derived):hex(salt)` PBKDF2 format the
/// existing user table already holds, random identifiers for rows and
/// uploads, and session signing secrets.

pub mod ids;
pub mod keys;
pub mod password;

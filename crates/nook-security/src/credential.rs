//! Password generation and salted credential hashing.
//!
//! Credentials are stored as a hex BLAKE3 hash of `salt || password`, in
//! derive-key mode under a fixed context string so the same bytes hashed
//! for any other purpose never collide with a credential.

use nook_types::{Credential, User};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Alphabet of generated passwords.
pub const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+";

const CONTEXT: &str = "nook 2024 credential v1";
const SALT_LEN: usize = 16;

/// Randomness source for passwords and salts.
pub type PasswordRng = Box<dyn RngCore + Send>;

/// The operating system's CSPRNG.
pub fn os_rng() -> PasswordRng {
    Box::new(OsRng)
}

/// `length` characters drawn uniformly from [`PASSWORD_CHARSET`].
pub fn generate_password<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]))
        .collect()
}

/// Hash `password` under a fresh random salt.
pub fn hash_password<R: RngCore + ?Sized>(rng: &mut R, password: &str) -> Credential {
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    Credential {
        password_hash: digest(&salt, password).to_hex().to_string(),
        salt: hex::encode(salt),
    }
}

/// Check `candidate` against stored credential material.
///
/// Malformed stored material never matches.
pub fn verify_credential(credential: &Credential, candidate: &str) -> bool {
    let Ok(salt) = hex::decode(&credential.salt) else {
        return false;
    };
    let Ok(expected) = blake3::Hash::from_hex(&credential.password_hash) else {
        return false;
    };
    // `blake3::Hash` equality is constant-time.
    digest(&salt, candidate) == expected
}

/// Check `candidate` against the user's current password.
pub fn verify_password(user: &User, candidate: &str) -> bool {
    verify_credential(&user.credential, candidate)
}

fn digest(salt: &[u8], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(CONTEXT);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

//! Credential format checks and password hashing.
//!
//! Validation happens before anything touches the account store, and the
//! rules are shared by client (for early feedback) and server (as the
//! authority). None of these functions log or retain what they are given.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use thiserror::Error;
use zeroize::Zeroizing;

/// Minimum username length in bytes.
pub const USERNAME_MIN_BYTES: usize = 4;
/// Maximum username length in bytes.
pub const USERNAME_MAX_BYTES: usize = 64;

/// Minimum password length in bytes.
pub const PASSWORD_MIN_BYTES: usize = 4;
/// Maximum password length enforced by [`check_password`].
pub const PASSWORD_MAX_BYTES: usize = 64;
/// Maximum password length the sign-up help text advertises. The prompt
/// and the validator disagree (32 vs 64); the validator is authoritative,
/// and the front end should render this constant so the two can only be
/// reconciled in one place.
pub const PASSWORD_ADVERTISED_MAX_BYTES: usize = 32;

/// Maximum e-mail address length in bytes.
pub const EMAIL_MAX_BYTES: usize = 256;

/// The special characters a password may (and must) draw from.
pub const SPECIAL_CHARS: &[u8; 26] = b"~!@#$%^&(){}[]-_=+;:,.<>/|";

/// Credential rejection reasons, surfaced verbatim to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("length must be {min}-{max} bytes, got {got}")]
    BadLength { min: usize, max: usize, got: usize },

    #[error("illegal character")]
    IllegalChar,

    #[error("not complex enough: need a special character and at least 3 character classes")]
    NotComplexEnough,

    #[error("malformed e-mail address")]
    BadFormat,

    #[error("password hashing failed")]
    HashFailure,
}

/// Validate password format and complexity.
///
/// Length within `[PASSWORD_MIN_BYTES, PASSWORD_MAX_BYTES]`; characters
/// limited to lowercase, uppercase, digits, and [`SPECIAL_CHARS`]; at
/// least 3 of those 4 classes present, one of which must be a special
/// character.
pub fn check_password(password: &str) -> Result<(), CredentialError> {
    let len = password.len();
    if !(PASSWORD_MIN_BYTES..=PASSWORD_MAX_BYTES).contains(&len) {
        return Err(CredentialError::BadLength {
            min: PASSWORD_MIN_BYTES,
            max: PASSWORD_MAX_BYTES,
            got: len,
        });
    }

    let (mut digit, mut lower, mut upper, mut special) = (false, false, false, false);
    for byte in password.bytes() {
        if byte.is_ascii_digit() {
            digit = true;
        } else if byte.is_ascii_lowercase() {
            lower = true;
        } else if byte.is_ascii_uppercase() {
            upper = true;
        } else if SPECIAL_CHARS.contains(&byte) {
            special = true;
        } else {
            return Err(CredentialError::IllegalChar);
        }
    }

    let classes = usize::from(digit) + usize::from(lower) + usize::from(upper) + usize::from(special);
    if !special || classes < 3 {
        return Err(CredentialError::NotComplexEnough);
    }
    Ok(())
}

/// Validate username format: 4-64 bytes of ASCII alphanumerics, `-`, `_`.
pub fn check_username(username: &str) -> Result<(), CredentialError> {
    let len = username.len();
    if !(USERNAME_MIN_BYTES..=USERNAME_MAX_BYTES).contains(&len) {
        return Err(CredentialError::BadLength {
            min: USERNAME_MIN_BYTES,
            max: USERNAME_MAX_BYTES,
            got: len,
        });
    }
    if !username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(CredentialError::IllegalChar);
    }
    Ok(())
}

/// Validate e-mail format: `local@label(.label)+` with a top-level label
/// of at least 2 characters, at most [`EMAIL_MAX_BYTES`] bytes total.
pub fn check_email(email: &str) -> Result<(), CredentialError> {
    let len = email.len();
    if len == 0 || len > EMAIL_MAX_BYTES {
        return Err(CredentialError::BadLength {
            min: 1,
            max: EMAIL_MAX_BYTES,
            got: len,
        });
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(CredentialError::BadFormat);
    };
    if local.is_empty()
        || !local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'+' | b'-'))
    {
        return Err(CredentialError::BadFormat);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(CredentialError::BadFormat);
    }
    let (tld, rest) = labels.split_last().unwrap();
    if tld.len() < 2
        || !tld
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(CredentialError::BadFormat);
    }
    for label in rest {
        if label.is_empty()
            || !label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(CredentialError::BadFormat);
        }
    }
    Ok(())
}

/// Hash a password with Argon2id and a fresh random salt.
///
/// Returns the PHC-encoded hash string for storage. The function consumes
/// the plaintext; the `Zeroizing` wrapper wipes it when this returns, on
/// the success and the failure path alike. Callers must not keep another
/// copy alive.
pub fn hash_password(password: Zeroizing<String>) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| CredentialError::HashFailure)?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::PasswordHash;
    use argon2::PasswordVerifier;

    #[test]
    fn test_password_too_short() {
        assert!(matches!(
            check_password("abc"),
            Err(CredentialError::BadLength { got: 3, .. })
        ));
    }

    #[test]
    fn test_password_too_long() {
        let long = "a".repeat(65);
        assert!(matches!(
            check_password(&long),
            Err(CredentialError::BadLength { got: 65, .. })
        ));
    }

    #[test]
    fn test_password_without_special_char_not_complex() {
        assert_eq!(
            check_password("abcDEF12"),
            Err(CredentialError::NotComplexEnough)
        );
    }

    #[test]
    fn test_password_with_three_classes_and_special_ok() {
        assert_eq!(check_password("abcDEF1!"), Ok(()));
    }

    #[test]
    fn test_password_special_alone_not_enough_classes() {
        assert_eq!(check_password("abcd!!!!"), Err(CredentialError::NotComplexEnough));
    }

    #[test]
    fn test_password_illegal_char() {
        assert_eq!(check_password("abcDEF1 "), Err(CredentialError::IllegalChar));
        assert_eq!(check_password("abcDEF1\u{e9}"), Err(CredentialError::IllegalChar));
    }

    #[test]
    fn test_special_char_set_is_complete() {
        for &byte in SPECIAL_CHARS.iter() {
            let candidate = format!("abD1{}", byte as char);
            assert_eq!(check_password(&candidate), Ok(()), "rejected {}", byte as char);
        }
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(check_username("user_name-1"), Ok(()));
        assert!(matches!(
            check_username("ab"),
            Err(CredentialError::BadLength { got: 2, .. })
        ));
        assert_eq!(check_username("bad name!"), Err(CredentialError::IllegalChar));
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(check_email("a@b.co"), Ok(()));
        assert_eq!(check_email("first.last+tag@mail.example.com"), Ok(()));
        assert_eq!(check_email("not-an-email"), Err(CredentialError::BadFormat));
        assert_eq!(check_email("a@b"), Err(CredentialError::BadFormat));
        assert_eq!(check_email("a@b.c"), Err(CredentialError::BadFormat));
        assert_eq!(check_email("a@@b.co"), Err(CredentialError::BadFormat));

        let oversized = format!("{}@example.com", "a".repeat(300));
        assert!(matches!(
            check_email(&oversized),
            Err(CredentialError::BadLength { .. })
        ));
    }

    #[test]
    fn test_hash_password_produces_verifiable_phc_string() {
        let encoded = hash_password(Zeroizing::new("abcDEF1!".to_string())).unwrap();
        assert!(encoded.starts_with("$argon2id$"));

        let parsed = PasswordHash::new(&encoded).unwrap();
        assert!(Argon2::default()
            .verify_password(b"abcDEF1!", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong-pw", &parsed)
            .is_err());
    }

    #[test]
    fn test_hash_password_salts_differ() {
        let a = hash_password(Zeroizing::new("abcDEF1!".to_string())).unwrap();
        let b = hash_password(Zeroizing::new("abcDEF1!".to_string())).unwrap();
        assert_ne!(a, b);
    }
}

use std::fmt;

use thiserror::Error;

/// The integer key a session obscures and reveals with.
///
/// Only the low byte takes part in the transform, so keys whose low byte is
/// zero are refused: they would leave every byte untouched.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKey {
    value: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key must be a positive whole number")]
    Invalid,
    #[error("key {0} is a multiple of 256 and would leave secrets unobscured")]
    Degenerate(i64),
}

impl SessionKey {
    pub fn new(value: i64) -> Result<Self, KeyError> {
        if value <= 0 {
            return Err(KeyError::Invalid);
        }
        if value & 0xFF == 0 {
            return Err(KeyError::Degenerate(value));
        }
        Ok(Self { value })
    }

    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let value = raw.trim().parse::<i64>().map_err(|_| KeyError::Invalid)?;
        Self::new(value)
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl fmt::Debug for SessionKey {
    // keep the key out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// XOR every byte with the key. Applying it twice with the same key gives the
/// input back, so this is both directions of the transform.
pub fn obscure(bytes: &[u8], key: i64) -> Vec<u8> {
    let mask = key as u8;
    bytes.iter().map(|b| b ^ mask).collect()
}

pub fn reveal(bytes: &[u8], key: i64) -> Vec<u8> {
    obscure(bytes, key)
}

pub fn obscure_with(bytes: &[u8], key: &SessionKey) -> Vec<u8> {
    obscure(bytes, key.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [&str; 5] = ["", "a", "hunter2", "correct horse battery staple", "ünïcødé ✓"];

    #[test]
    fn reveal_undoes_obscure() {
        for key in [1, 7, 42, 255, 257, 1_000_003, -3] {
            for s in SAMPLES {
                let hidden = obscure(s.as_bytes(), key);
                assert_eq!(reveal(&hidden, key), s.as_bytes(), "key {key} text {s:?}");
            }
        }
    }

    #[test]
    fn obscure_is_self_inverse() {
        for key in [3, 99, 12_345] {
            for s in SAMPLES {
                let twice = obscure(&obscure(s.as_bytes(), key), key);
                assert_eq!(twice, s.as_bytes());
            }
        }
    }

    #[test]
    fn obscure_keeps_length() {
        let hidden = obscure(b"password", 42);
        assert_eq!(hidden.len(), 8);
        assert_ne!(hidden, b"password");
    }

    #[test]
    fn session_key_parsing() {
        assert_eq!(SessionKey::parse(" 42 ").unwrap().value(), 42);
        assert_eq!(SessionKey::parse("abc"), Err(KeyError::Invalid));
        assert_eq!(SessionKey::parse(""), Err(KeyError::Invalid));
        assert_eq!(SessionKey::parse("0"), Err(KeyError::Invalid));
        assert_eq!(SessionKey::parse("-5"), Err(KeyError::Invalid));
        assert_eq!(SessionKey::parse("512"), Err(KeyError::Degenerate(512)));
    }

    #[test]
    fn session_key_matches_raw_transform() {
        let key = SessionKey::new(300).unwrap();
        assert_eq!(obscure_with(b"site", &key), obscure(b"site", 300));
    }

    #[test]
    fn debug_hides_key() {
        let key = SessionKey::new(77).unwrap();
        assert!(!format!("{key:?}").contains("77"));
    }
}

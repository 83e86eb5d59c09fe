use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::crypto::{SessionKey, obscure_with, reveal};

/// Bytes produced by the obscuring transform.
///
/// On disk every byte is written as the character with the same code point
/// (U+0000..=U+00FF), which keeps arbitrary transform output inside a JSON
/// string. ASCII bytes therefore appear unchanged in the file.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Obscured(Vec<u8>);

impl Obscured {
    pub fn seal(plaintext: &str, key: &SessionKey) -> Self {
        Self(obscure_with(plaintext.as_bytes(), key))
    }

    pub fn open(&self, key: &SessionKey) -> String {
        String::from_utf8_lossy(&reveal(&self.0, key.value())).into_owned()
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Text form used in the store file.
    pub fn to_file_text(&self) -> String {
        self.0.iter().map(|&b| char::from(b)).collect()
    }

    pub fn from_file_text(text: &str) -> Option<Self> {
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect::<Option<Vec<u8>>>()
            .map(Self)
    }

    /// Printable rendering of the raw obscured bytes for list rows.
    pub fn display_masked(&self) -> String {
        self.0
            .iter()
            .map(|&b| {
                let c = char::from(b);
                if c.is_control() { '·' } else { c }
            })
            .collect()
    }
}

impl fmt::Debug for Obscured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obscured({} bytes)", self.0.len())
    }
}

impl Serialize for Obscured {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_file_text())
    }
}

struct ObscuredVisitor;

impl<'de> Visitor<'de> for ObscuredVisitor {
    type Value = Obscured;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string of characters in U+0000..=U+00FF")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Obscured, E> {
        Obscured::from_file_text(v)
            .ok_or_else(|| E::custom("obscured text holds a character above U+00FF"))
    }
}

impl<'de> Deserialize<'de> for Obscured {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(ObscuredVisitor)
    }
}

/// One label/secret pair, both still obscured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub label: Obscured,
    pub secret: Obscured,
}

/// Contents of `passrc.json`.
#[derive(Serialize, Deserialize)]
pub struct MasterRecord {
    pub master: Obscured,
}

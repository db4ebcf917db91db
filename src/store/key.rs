//! Typed store keys
//!
//! A key is a tuple of string and integer parts. Parts are encoded so that
//! byte order matches tuple order:
//!
//! ```text
//! Str: [0x02][bytes, 0x00 escaped as 0x00 0xFF][0x00]
//! Int: [0x21][i64 big-endian with the sign bit flipped]
//! ```
//!
//! Every encoded part starts below 0xFF, so all keys extending a prefix `P`
//! fall inside `[P, P ++ 0xFF)`.

use std::fmt;

use crate::error::{GatewayError, Result};

const TAG_STR: u8 = 0x02;
const TAG_INT: u8 = 0x21;
const ESCAPE: u8 = 0xFF;
const PREFIX_END: u8 = 0xFF;

/// One component of a [`Key`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::Str(s.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<u16> for KeyPart {
    fn from(n: u16) -> Self {
        KeyPart::Int(i64::from(n))
    }
}

impl From<usize> for KeyPart {
    fn from(n: usize) -> Self {
        KeyPart::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{:?}", s),
            KeyPart::Int(n) => write!(f, "{}", n),
        }
    }
}

/// An ordered tuple key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    parts: Vec<KeyPart>,
}

impl Key {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn last(&self) -> Option<&KeyPart> {
        self.parts.last()
    }

    /// Order-preserving byte encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.parts.len() * 9);
        for part in &self.parts {
            match part {
                KeyPart::Str(s) => {
                    out.push(TAG_STR);
                    for &b in s.as_bytes() {
                        out.push(b);
                        if b == 0x00 {
                            out.push(ESCAPE);
                        }
                    }
                    out.push(0x00);
                }
                KeyPart::Int(n) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
                }
            }
        }
        out
    }

    /// Inverse of [`Key::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut parts = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                TAG_STR => {
                    pos += 1;
                    let mut raw = Vec::new();
                    loop {
                        let b = *bytes.get(pos).ok_or_else(|| {
                            GatewayError::Serialization("unterminated string key part".to_string())
                        })?;
                        pos += 1;
                        if b != 0x00 {
                            raw.push(b);
                        } else if bytes.get(pos) == Some(&ESCAPE) {
                            raw.push(0x00);
                            pos += 1;
                        } else {
                            break;
                        }
                    }
                    let s = String::from_utf8(raw).map_err(|e| {
                        GatewayError::Serialization(format!("key part is not UTF-8: {}", e))
                    })?;
                    parts.push(KeyPart::Str(s));
                }
                TAG_INT => {
                    let raw = bytes.get(pos + 1..pos + 9).ok_or_else(|| {
                        GatewayError::Serialization("truncated integer key part".to_string())
                    })?;
                    let mut be = [0u8; 8];
                    be.copy_from_slice(raw);
                    parts.push(KeyPart::Int((u64::from_be_bytes(be) ^ (1 << 63)) as i64));
                    pos += 9;
                }
                tag => {
                    return Err(GatewayError::Serialization(format!(
                        "unknown key part tag 0x{:02x}",
                        tag
                    )))
                }
            }
        }

        Ok(Self { parts })
    }

    /// Half-open byte range covering every key that extends this one
    pub fn prefix_range(&self) -> (Vec<u8>, Vec<u8>) {
        let start = self.encode();
        let mut end = start.clone();
        end.push(PREFIX_END);
        (start, end)
    }
}

impl<P: Into<KeyPart>> FromIterator<P> for Key {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}

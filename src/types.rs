//! Core types: Symbol

use std::fmt;

/// Maximum ticker length in bytes.
pub const SYMBOL_MAX_LEN: usize = 8;

/// Instrument identifier stored inline (up to 8 ASCII bytes).
///
/// `Copy`, hashable and ordered by its string form, so it can be used as a
/// map key without allocation. Longer inputs are truncated by [`Symbol::new`];
/// use [`Symbol::try_new`] to reject them instead.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Symbol {
    bytes: [u8; SYMBOL_MAX_LEN],
    len: u8,
}

impl Symbol {
    /// Build a symbol, truncating to 8 bytes.
    pub fn new(s: &str) -> Self {
        let src = s.as_bytes();
        let mut end = src.len().min(SYMBOL_MAX_LEN);
        // keep the truncation on a char boundary
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; SYMBOL_MAX_LEN];
        bytes[..end].copy_from_slice(&src[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    /// Build a symbol, returning `None` if `s` is longer than 8 bytes.
    pub fn try_new(s: &str) -> Option<Self> {
        if s.len() > SYMBOL_MAX_LEN {
            return None;
        }
        Some(Self::new(s))
    }

    pub fn as_str(&self) -> &str {
        // bytes[..len] always comes from a &str cut on a char boundary
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Symbol::try_new(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("symbol '{s}' exceeds 8 bytes")))
    }
}

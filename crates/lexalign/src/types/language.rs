//! Language identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A language code (`en`, `de`, `ru`, ...).
///
/// Codes are lowercased at construction so lookups are insensitive to the
/// caller's casing. `Ord` is derived so per-language maps iterate in a
/// deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lang(String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_lowercases() {
        assert_eq!(Lang::new("EN"), Lang::new("en"));
        assert_eq!(Lang::new("De").as_str(), "de");
    }

    #[test]
    fn test_lang_orders_deterministically() {
        let mut langs = vec![Lang::new("ru"), Lang::new("de"), Lang::new("en")];
        langs.sort();
        let codes: Vec<&str> = langs.iter().map(|l| l.as_str()).collect();
        assert_eq!(codes, vec!["de", "en", "ru"]);
    }
}

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::AnalysisError;

lazy_static! {
    /// 1-5 uppercase letters, optional 1-2 letter class suffix (e.g. BRK.B)
    static ref TICKER_REGEX: Regex =
        Regex::new(r"^[A-Z]{1,5}(\.[A-Z]{1,2})?$").expect("Invalid regex pattern");
}

/// Validated exchange symbol. Identity key for the cache and every upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Validate a raw symbol. No case folding: `aapl` is rejected.
    pub fn parse(raw: &str) -> Result<Self, AnalysisError> {
        if TICKER_REGEX.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AnalysisError::Validation(format!(
                "Invalid ticker '{}'. Use 1-5 uppercase letters, optional class suffix (e.g., BRK.B).",
                raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base symbol without the class suffix (`BRK.B` -> `BRK`).
    pub fn base(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Class suffix, if any (`BRK.B` -> `Some("B")`).
    pub fn class_suffix(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, suffix)| suffix)
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Ticker {
    type Error = AnalysisError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ticker::parse(value)
    }
}

impl<'de> Deserialize<'de> for Ticker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ticker::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_class_tickers() {
        for raw in ["A", "AAPL", "GOOGL", "BRK.B", "BF.AB"] {
            assert!(Ticker::parse(raw).is_ok(), "{} should be valid", raw);
        }
    }

    #[test]
    fn test_rejects_malformed_tickers() {
        for raw in ["", "aapl", "TOOLONGNAME", "BRK.", "BRK.ABC", "AB1", " AAPL", "BRK-B"] {
            let err = Ticker::parse(raw).unwrap_err();
            assert_eq!(err.kind(), "ValidationError", "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_base_and_suffix() {
        let t = Ticker::parse("BRK.B").unwrap();
        assert_eq!(t.base(), "BRK");
        assert_eq!(t.class_suffix(), Some("B"));

        let t = Ticker::parse("MSFT").unwrap();
        assert_eq!(t.base(), "MSFT");
        assert_eq!(t.class_suffix(), None);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Ticker = serde_json::from_str("\"NVDA\"").unwrap();
        assert_eq!(ok.as_str(), "NVDA");
        assert!(serde_json::from_str::<Ticker>("\"nvda\"").is_err());
    }
}

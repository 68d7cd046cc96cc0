use crate::error::DataError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// OANDA instrument identifier, eg/ "EUR_USD".
///
/// Opaque to this crate beyond being a non-empty URL path segment; the API is the authority on
/// which instruments exist.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
#[serde(try_from = "String")]
pub struct InstrumentName(SmolStr);

impl InstrumentName {
    pub fn new<S>(name: S) -> Result<Self, DataError>
    where
        S: AsRef<str>,
    {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(DataError::EmptyInstrument);
        }
        if !is_path_segment(name) {
            return Err(DataError::InvalidInstrument(name.to_owned()));
        }
        Ok(Self(SmolStr::new(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InstrumentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for InstrumentName {
    type Error = DataError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl TryFrom<String> for InstrumentName {
    type Error = DataError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

/// Whether `value` can be substituted into a URL path as-is: ASCII letters, digits, `_`, `-`
/// and `.` only.
pub(crate) fn is_path_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_name_trims_and_displays() {
        let name = InstrumentName::new(" GBP_USD ").unwrap();
        assert_eq!(name.as_str(), "GBP_USD");
        assert_eq!(name.to_string(), "GBP_USD");
    }

    #[test]
    fn test_instrument_name_rejects_empty() {
        assert!(matches!(InstrumentName::new(""), Err(DataError::EmptyInstrument)));
        assert!(matches!(InstrumentName::try_from("   "), Err(DataError::EmptyInstrument)));
    }

    #[test]
    fn test_instrument_name_rejects_url_reserved_characters() {
        for name in ["EUR/USD", "EUR_USD?price=M", "EUR_USD#x", "EUR USD", "%2F"] {
            assert!(
                matches!(InstrumentName::new(name), Err(DataError::InvalidInstrument(_))),
                "{name} accepted"
            );
        }
        assert!(InstrumentName::new("SPX500_USD").is_ok());
    }

    #[test]
    fn test_instrument_name_deserialize_validates() {
        let name: InstrumentName = serde_json::from_str(r#""EUR_USD""#).unwrap();
        assert_eq!(name.as_str(), "EUR_USD");

        assert!(serde_json::from_str::<InstrumentName>(r#""""#).is_err());
        assert!(serde_json::from_str::<InstrumentName>(r#""EUR/USD""#).is_err());
    }
}

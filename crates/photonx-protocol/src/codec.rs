//! Canonical wire encoding helpers.

/// Serde adapter for integers carried as unsigned decimal strings.
///
/// Usage: `#[serde(with = "crate::codec::dec_string")]`.
pub mod dec_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super::dec_string")]
        nonce: u64,
    }

    #[test]
    fn test_u64_as_decimal_string() {
        let json = serde_json::to_string(&Wrapper { nonce: 42 }).unwrap();
        assert_eq!(json, r#"{"nonce":"42"}"#);

        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nonce, 42);
    }

    #[test]
    fn test_rejects_negative() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"nonce":"-1"}"#).is_err());
    }
}

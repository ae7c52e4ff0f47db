//! Lenient parsing of backend timestamps
//!
//! The backend is not consistent: conversation documents carry RFC 3339
//! strings, older records carry epoch millis. Anything else is treated as
//! unknown and callers decide how to order it.

use chrono::{DateTime, TimeZone, Utc};

/// Parse an RFC 3339 string or an integer epoch-millis string
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    raw.parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

/// Like [`parse_timestamp`] but unparsable input orders as the oldest value
pub fn parse_or_oldest(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Serde adaptor accepting either timestamp representation
pub mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Millis(millis) => millis.to_string(),
        };
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognised timestamp '{raw}'")))
    }
}

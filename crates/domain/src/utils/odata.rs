//! Serde helpers for the Exact Online OData JSON dialect.
//!
//! Exact Online returns dates as `"/Date(<millis>[+-<minutes>])/"` and accepts
//! plain `"YYYY-MM-DD"` on writes. Binary fields travel as standard base64.
//! Use the submodules with `#[serde(with = "...")]`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ODATA_DATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^/Date\(([0-9]+)([+-][0-9]+)?\)/$").ok());

const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse an OData `/Date(...)/` literal.
///
/// The optional signed suffix is an offset in minutes that is added to the
/// timestamp. Returns `None` when the literal is malformed.
///
/// ```
/// use koppeling_domain::utils::odata::parse_odata_datetime;
///
/// let at = parse_odata_datetime("/Date(61234-1)/").unwrap();
/// assert_eq!(at.timestamp_millis(), 1234);
/// ```
#[must_use]
pub fn parse_odata_datetime(literal: &str) -> Option<DateTime<Utc>> {
    let captures = ODATA_DATE.as_ref()?.captures(literal)?;
    let millis: i64 = captures.get(1)?.as_str().parse().ok()?;
    let offset_minutes: i64 = match captures.get(2) {
        Some(offset) => offset.as_str().parse().ok()?,
        None => 0,
    };
    let millis = millis.checked_add(offset_minutes.checked_mul(60_000)?)?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse either an OData date literal or a plain `YYYY-MM-DD` date.
#[must_use]
pub fn parse_wire_date(literal: &str) -> Option<NaiveDate> {
    parse_odata_datetime(literal)
        .map(|at| at.date_naive())
        .or_else(|| NaiveDate::parse_from_str(literal, WIRE_DATE_FORMAT).ok())
}

/// Required date: reads OData literals, writes `YYYY-MM-DD`.
pub mod date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{parse_wire_date, WIRE_DATE_FORMAT};

    pub fn serialize<S: Serializer>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(WIRE_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_wire_date(&raw)
            .ok_or_else(|| de::Error::custom(format!("error unmarshaling date `{raw}`")))
    }
}

/// Optional date: `null` maps to `None`.
pub mod option_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{parse_wire_date, WIRE_DATE_FORMAT};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format(WIRE_DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.is_empty() => parse_wire_date(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("error unmarshaling date `{raw}`"))),
            _ => Ok(None),
        }
    }
}

/// Binary payload: `None` is `null`, empty is `""`, otherwise base64.
pub mod binary {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            None => serializer.serialize_none(),
            Some(bytes) if bytes.is_empty() => serializer.serialize_str(""),
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(de::Error::custom),
        }
    }
}

/// Integer that Exact Online transmits as a JSON string (e.g. `HID`).
pub mod string_int {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(value),
            Raw::Text(text) if text.is_empty() => Ok(0),
            Raw::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

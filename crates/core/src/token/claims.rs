//! Decoded token payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims carried in a token's payload segment
///
/// Only the registered claims used for local validation are interpreted.
/// Anything else is kept in [`Claims::extra`] and serialized back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identifier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiration time (epoch seconds)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "numeric_date::deserialize"
    )]
    pub exp: Option<i64>,
    /// Not before (epoch seconds)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "numeric_date::deserialize"
    )]
    pub nbf: Option<i64>,
    /// Issued at (epoch seconds)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "numeric_date::deserialize"
    )]
    pub iat: Option<i64>,
    /// Claims that are decoded but not interpreted
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Look up a claim that is not one of the interpreted fields
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Subject identifier, if present
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref()
    }
}

/// NumericDate claims accept JSON integers and floats; floats truncate.
mod numeric_date {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    #[allow(clippy::cast_possible_truncation)]
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|secs| secs.trunc() as i64))
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("numeric date out of range: {number}"))),
            Some(other) => Err(D::Error::custom(format!(
                "expected numeric date, found {other}"
            ))),
        }
    }
}

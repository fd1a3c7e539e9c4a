use serde::{Deserialize, Serialize};

/// Opaque pagination marker handed out by the provider.
///
/// The provider uses numbers, but the value is kept as text so any marker can be echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The cursor of the first page.
    pub fn start() -> Self {
        Self("0".to_string())
    }

    /// The JSON value to send back in a listing request body.
    pub fn to_json(&self) -> serde_json::Value {
        match self.0.parse::<i64>() {
            Ok(number) => number.into(),
            Err(_) => self.0.clone().into(),
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Cursor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(number) => Cursor(number.to_string()),
            Raw::Text(text) => Cursor(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_cursor_is_sent_as_number() {
        let cursor: Cursor = serde_json::from_value(json!(1700000000000_i64)).unwrap();
        assert_eq!(cursor.to_json(), json!(1700000000000_i64));
    }

    #[test]
    fn textual_cursor_is_sent_as_text() {
        let cursor: Cursor = serde_json::from_value(json!("c1")).unwrap();
        assert_eq!(cursor, Cursor::new("c1"));
        assert_eq!(cursor.to_json(), json!("c1"));
    }

    #[test]
    fn first_page_starts_at_zero() {
        assert_eq!(Cursor::default().to_json(), json!(0));
    }
}

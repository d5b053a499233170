use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attributes of a telemetry item keyed by name.
///
/// Keys are unique. Inserting an existing key replaces its value.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A typed attribute value.
///
/// Serializes with an explicit type tag, for example `{"type":"integer","value":42}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    /// A UTF-8 string.
    String(String),
    /// A boolean.
    Boolean(bool),
    /// A signed 64-bit integer.
    Integer(i64),
    /// A double precision floating point number.
    Double(f64),
}

impl AttributeValue {
    /// Returns the string value if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_serialize_tagged() {
        let attributes = Attributes::from([
            ("a.string".to_owned(), AttributeValue::from("foo")),
            ("b.bool".to_owned(), AttributeValue::from(true)),
            ("c.int".to_owned(), AttributeValue::from(42)),
            ("d.double".to_owned(), AttributeValue::from(1.5)),
        ]);

        assert_snapshot!(serde_json::to_string(&attributes).unwrap(), @r#"{"a.string":{"type":"string","value":"foo"},"b.bool":{"type":"boolean","value":true},"c.int":{"type":"integer","value":42},"d.double":{"type":"double","value":1.5}}"#);
    }

    #[test]
    fn test_deserialize_tagged() {
        let value: AttributeValue =
            serde_json::from_str(r#"{"type":"integer","value":7}"#).unwrap();
        assert_eq!(value, AttributeValue::Integer(7));
        assert!(serde_json::from_str::<AttributeValue>(r#"{"type":"array","value":[]}"#).is_err());
    }
}

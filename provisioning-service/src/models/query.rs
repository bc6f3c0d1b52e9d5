use serde::Serialize;
use serde_json::Value;

/// Equality filter over document attributes.
///
/// Serialized as the backend's JSON query form:
/// `{"method":"equal","attribute":"role","values":["admin"]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    method: &'static str,
    attribute: String,
    values: Vec<Value>,
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Self {
            method: "equal",
            attribute: attribute.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Evaluate against a serialized document.
    pub fn matches(&self, document: &Value) -> bool {
        match document.get(&self.attribute) {
            Some(actual) => self.values.iter().any(|v| v == actual),
            None => false,
        }
    }
}

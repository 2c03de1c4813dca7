//! Stage output returned by a successful remote call.

use serde::{Deserialize, Serialize};

/// The product of one successful stage invocation.
///
/// `data` is what gets recorded in the run's results under the stage key;
/// `message` is an optional success notice for the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// The payload, if the stage produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// A success notice ("Audio ready").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageOutput {
    /// Creates an output carrying a payload.
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            message: None,
        }
    }

    /// Creates an output with no payload.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self::default()
    }

    /// Serializes `value` as the payload.
    pub fn typed<T: Serialize>(value: &T) -> crate::errors::Result<Self> {
        Ok(Self::ok(serde_json::to_value(value)?))
    }

    /// Attaches a success notice.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The value to record in the run's results.
    #[must_use]
    pub fn into_result(self) -> serde_json::Value {
        self.data.unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_output_records_null() {
        assert_eq!(StageOutput::ok_empty().into_result(), serde_json::Value::Null);
    }

    #[test]
    fn test_typed_output() {
        let output = StageOutput::typed(&vec!["a.mp3", "b.mp3"])
            .unwrap()
            .with_message("Audio ready");
        assert_eq!(output.message.as_deref(), Some("Audio ready"));
        assert_eq!(output.into_result(), json!(["a.mp3", "b.mp3"]));
    }
}

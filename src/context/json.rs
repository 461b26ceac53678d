use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "application")]
    Application,
    #[serde(rename = "server")]
    Server,
}

/// JSON envelope written by `Context::json`.
///
/// ```json
/// {"Status": 422, "Data": null, "ErrorType": "application", "Error": {"msg": "..."}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonResponse {
    pub status: u16,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error_type: ErrorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Map<String, Value>>,
}

impl JsonResponse {
    pub fn data(status: u16, data: impl Serialize) -> Self {
        Self {
            status,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            ..Self::default()
        }
    }

    pub fn error(status: u16, error: Map<String, Value>) -> Self {
        Self {
            status,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Fills in `error_type` from the status when an error is present and
    /// no type was chosen: 5xx is a server error, anything else is the
    /// application's.
    pub fn derive_error_type(&mut self) {
        if self.has_error() && self.error_type == ErrorType::Unset {
            self.error_type = if self.status >= 500 {
                ErrorType::Server
            } else {
                ErrorType::Application
            };
        }
    }
}

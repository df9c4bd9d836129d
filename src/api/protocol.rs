//! Wire format of the line-delimited JSON protocol
//!
//! One request object per line in, one response object per line out.

use crate::errors::{CustodyError, ErrorClass};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request as read from the wire
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    pub operation: String,
    pub path: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub class: String,
    pub code: String,
    pub message: String,
}

/// Either `data` or `error` is set, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn error(err: &CustodyError) -> Self {
        Self {
            data: None,
            error: Some(ErrorBody {
                class: err.class().as_str().to_string(),
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Response for a line that is not a request object
    pub fn parse_error(message: &str) -> Self {
        Self {
            data: None,
            error: Some(ErrorBody {
                class: ErrorClass::User.as_str().to_string(),
                code: "parse_error".to_string(),
                message: message.to_string(),
            }),
        }
    }
}

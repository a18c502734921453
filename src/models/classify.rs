//! Classification request/response payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppError;

/// Route served by the classifier and targeted by the client
pub const CLASSIFY_ROUTE: &str = "/classify/v0";

/// Classify request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Base64 encoded image (PNG/JPEG/...)
    pub image: String,
}

impl ClassifyRequest {
    /// Parse a raw JSON body.
    ///
    /// An empty or unparseable body, a non-object, or an object without
    /// `image` is a missing field; an `image` that is not a string is an
    /// encoding error.
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| AppError::MissingField)?;

        match value.get("image") {
            None => Err(AppError::MissingField),
            Some(Value::String(image)) => Ok(Self { image: image.clone() }),
            Some(other) => Err(AppError::InvalidEncoding(format!(
                "expected a base64 string, found {}",
                json_type(other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Model-backed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_digit: u8,
}

/// Echo-mode response: decoded bytes as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub decoded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClassifyResponse {
    Prediction(PredictionResponse),
    Echo(EchoResponse),
}

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// The `message` half of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Id(u64),
    Names(Vec<String>),
    Text(String),
}

/// JSON envelope returned by every management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: Payload,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Payload::Text(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Payload::Text(message.into()),
        }
    }

    pub fn names(names: Vec<String>) -> Self {
        Self {
            success: true,
            message: Payload::Names(names),
        }
    }

    pub fn id(id: u64) -> Self {
        Self {
            success: true,
            message: Payload::Id(id),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

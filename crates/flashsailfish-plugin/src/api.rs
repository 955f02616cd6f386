//! Route responses handed back to the host
//!
//! The host owns the HTTP server; handlers here produce a status code and a
//! body, and the host turns that into its own response type.

use flashsailfish_core::CatalogError;
use serde::{Deserialize, Serialize};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl PluginResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: STATUS_OK,
            body: ResponseBody::Json(value),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Text(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text: the message for errors, compact JSON otherwise
    pub fn body_text(&self) -> String {
        match &self.body {
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Text(text) => text.clone(),
        }
    }
}

impl From<&CatalogError> for PluginResponse {
    fn from(err: &CatalogError) -> Self {
        let message = match err {
            CatalogError::Fetch(_) => {
                format!("Unable to retrieve firmware information from {}", err.url())
            }
            CatalogError::Parse { url, .. } => format!(
                "Retrieved firmware information from {}, but was unable to understand the response",
                url
            ),
        };
        Self::error(STATUS_BAD_REQUEST, message)
    }
}

/// Body of a refresh request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RefreshRequest {
    /// New manifest URL, if the operator changed it
    #[serde(default)]
    pub url: Option<String>,
}

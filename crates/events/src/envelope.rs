use serde::{Deserialize, Serialize};

/// A cross-window message: the sender's origin plus an arbitrary JSON body.
///
/// The origin is attached by the transport, never by the sender, which makes
/// it the only trustworthy attribute of the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMessage {
    origin: String,
    data: serde_json::Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn into_data(self) -> serde_json::Value {
        self.data
    }
}

use serde::{Deserialize, Serialize};

/// Path of the checkout-session endpoint
pub const CHECKOUT_SESSION_PATH: &str = "/create-checkout-session";

/// Name lookup against `GET /search`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub name: String,
}

impl SearchRequest {
    /// Build a request from raw user input, or `None` if it is blank
    pub fn from_input(raw: &str) -> Option<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
        })
    }

    /// Request path with the name URL-encoded
    pub fn path(&self) -> String {
        format!("/search?name={}", urlencoding::encode(&self.name))
    }
}

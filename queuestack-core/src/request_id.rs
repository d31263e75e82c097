//! Request ID generation

use uuid::Uuid;

/// Identifier echoed back in every response for correlation
#[derive(Debug, Clone)]
pub struct RequestId {
    pub id: String,
}

impl RequestId {
    /// Mint a fresh request ID
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a request ID with a specific value (for testing)
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

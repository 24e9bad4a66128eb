use serde::{Deserialize, Serialize};

/// Identity resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identity provider subject (`sub` claim). Stable per user.
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

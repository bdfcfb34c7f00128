//! Response bodies shared by every transport.
//!
//! Mutations answer `{ "success": ... }`, failures answer `{ "error": ... }`.

use serde::{Deserialize, Serialize};
use services::CommentView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    pub success: String,
    /// Key of the created resource, when there is one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
}

impl Success {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: message.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub error: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentsPayload {
    pub comments: Vec<CommentView>,
}

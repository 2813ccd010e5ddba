//! Typed errors for the chefdesk library.
//!
//! Application paths (CLI, HTTP handlers) use `anyhow::Result` and attach
//! context as errors bubble up. The variants here are the failures callers
//! may want to match on: a missing credential surfaces as a 500 from the chat
//! endpoint, while an upstream HTTP status is echoed in the error body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChefError {
    /// A required credential was not present in the environment.
    #[error("{var} environment variable not set")]
    MissingCredential { var: String },

    /// The cooking agent could not be constructed.
    #[error("Failed to initialize cooking agent: {0}")]
    AgentInit(String),

    /// The blob storage connection string is malformed.
    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    /// Blob storage answered with a non-success status.
    #[error("Blob storage request failed (HTTP {status}): {body}")]
    Storage { status: u16, body: String },

    /// A hosted model API answered with a non-success status.
    #[error("Model API error (HTTP {status}): {body}")]
    ModelApi { status: u16, body: String },

    /// The model answered successfully but without any text.
    #[error("Model reply contained no text")]
    EmptyModelReply,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_names_variable() {
        let e = ChefError::MissingCredential {
            var: "GITHUB_TOKEN".into(),
        };
        assert_eq!(e.to_string(), "GITHUB_TOKEN environment variable not set");
    }

    #[test]
    fn agent_init_wraps_cause() {
        let e = ChefError::AgentInit("bad base url".into());
        assert!(e.to_string().starts_with("Failed to initialize cooking agent"));
        assert!(e.to_string().contains("bad base url"));
    }

    #[test]
    fn storage_display_includes_status() {
        let e = ChefError::Storage {
            status: 403,
            body: "AuthenticationFailed".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("403"), "got: {msg}");
        assert!(msg.contains("AuthenticationFailed"));
    }
}

//! Shared building blocks for the update engine workspace.
//!
//! Every error enum in the workspace carries an [`ErrorLocation`] so that a
//! logged failure points straight at the line that produced it. Secrets travel as
//! [`RedactedToken`] so they stay out of logs.

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use redacted_token::RedactedToken;

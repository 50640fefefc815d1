//! Call contract of the update engine backend.
//!
//! The backend owns all update business logic. This crate only reaches it through
//! [`UpdateEngineService`]: every operation takes its typed inputs and either returns
//! its outputs or an [`OperationError`] describing why it failed.

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Failure reported by a backend operation.
///
/// Carries a human-readable message only. Every failure is the same generic
/// classification on the wire; callers tell failures apart by message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for OperationError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.message)
    }
}

impl std::error::Error for OperationError {}

/// Snapshot of the backend's update status.
///
/// `progress` is expected in `0.0..=1.0` but the range is not enforced here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub last_checked_time: i64,
    pub progress: f64,
    pub current_operation: String,
    pub new_version: String,
    pub new_size: i64,
}

/// Operations the update engine backend exposes to remote callers.
///
/// Implementations serialize their own internal state; the facade calls these
/// methods concurrently from whichever task received the request.
pub trait UpdateEngineService: Send + Sync {
    fn attempt_update(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> Result<(), OperationError>;

    fn attempt_rollback(&self, powerwash: bool) -> Result<(), OperationError>;

    fn can_rollback(&self) -> Result<bool, OperationError>;

    fn reset_status(&self) -> Result<(), OperationError>;

    fn get_status(&self) -> Result<StatusSnapshot, OperationError>;

    fn reboot_if_needed(&self) -> Result<(), OperationError>;

    fn set_channel(&self, target_channel: &str, powerwash: bool) -> Result<(), OperationError>;

    /// Current channel when `get_current_channel` is set, otherwise the target channel.
    fn get_channel(&self, get_current_channel: bool) -> Result<String, OperationError>;

    fn set_p2p_update_permission(&self, enabled: bool) -> Result<(), OperationError>;

    fn get_p2p_update_permission(&self) -> Result<bool, OperationError>;

    fn set_update_over_cellular_permission(&self, enabled: bool) -> Result<(), OperationError>;

    fn get_update_over_cellular_permission(&self) -> Result<bool, OperationError>;

    /// Duration since the last successful update, in microseconds.
    fn get_duration_since_update(&self) -> Result<i64, OperationError>;

    fn get_prev_version(&self) -> Result<String, OperationError>;

    fn get_rollback_partition(&self) -> Result<String, OperationError>;
}

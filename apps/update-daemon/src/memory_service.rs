//! In-memory update engine backend.
//!
//! Holds channel, permission and status state for a device with no real payload
//! pipeline attached. Update attempts move the status to a checking state and stop there.
//! Every status change is sent to an optional notifier so a driver can broadcast it.

use engine_core::service::{OperationError, StatusSnapshot, UpdateEngineService};

use std::sync::{Mutex, MutexGuard};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

pub const DEFAULT_CHANNEL: &str = "stable-channel";

pub const STATUS_IDLE: &str = "UPDATE_STATUS_IDLE";
pub const STATUS_CHECKING_FOR_UPDATE: &str = "UPDATE_STATUS_CHECKING_FOR_UPDATE";
pub const STATUS_UPDATED_NEED_REBOOT: &str = "UPDATE_STATUS_UPDATED_NEED_REBOOT";

#[derive(Debug)]
struct EngineState {
    current_channel: String,
    target_channel: String,
    powerwash_on_channel_change: bool,
    p2p_update_permission: bool,
    update_over_cellular_permission: bool,
    status: StatusSnapshot,
    prev_version: String,
    rollback_partition: Option<String>,
    /// Set once an update has been applied and is waiting for reboot.
    update_completed_at: Option<Instant>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            current_channel: DEFAULT_CHANNEL.to_string(),
            target_channel: DEFAULT_CHANNEL.to_string(),
            powerwash_on_channel_change: false,
            p2p_update_permission: false,
            update_over_cellular_permission: false,
            status: idle_status(0),
            prev_version: String::new(),
            rollback_partition: None,
            update_completed_at: None,
        }
    }
}

fn idle_status(last_checked_time: i64) -> StatusSnapshot {
    StatusSnapshot {
        last_checked_time,
        progress: 0.0,
        current_operation: STATUS_IDLE.to_string(),
        new_version: String::new(),
        new_size: 0,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct InMemoryUpdateEngine {
    state: Mutex<EngineState>,
    status_changes: Option<UnboundedSender<StatusSnapshot>>,
}

impl InMemoryUpdateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that sends a copy of every new status to `status_changes`.
    pub fn with_status_notifier(status_changes: UnboundedSender<StatusSnapshot>) -> Self {
        Self {
            status_changes: Some(status_changes),
            ..Self::default()
        }
    }

    /// Seed a previous version and rollback partition, as left behind by an earlier update.
    #[cfg(test)]
    pub(crate) fn with_rollback(prev_version: &str, rollback_partition: &str) -> Self {
        let state = EngineState {
            prev_version: prev_version.to_string(),
            rollback_partition: Some(rollback_partition.to_string()),
            ..EngineState::default()
        };
        Self {
            state: Mutex::new(state),
            status_changes: None,
        }
    }

    /// Record a finished update so the engine reports a pending reboot.
    #[cfg(test)]
    pub(crate) fn mark_update_applied(&self, new_version: &str) -> Result<(), OperationError> {
        let mut state = self.lock()?;
        state.status = StatusSnapshot {
            last_checked_time: unix_now(),
            progress: 1.0,
            current_operation: STATUS_UPDATED_NEED_REBOOT.to_string(),
            new_version: new_version.to_string(),
            new_size: state.status.new_size,
        };
        state.update_completed_at = Some(Instant::now());
        self.publish(&state.status);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, OperationError> {
        self.state
            .lock()
            .map_err(|_| OperationError::new("Engine state lock poisoned"))
    }

    /// Called with the state lock held so changes are published in the order they happen.
    fn publish(&self, status: &StatusSnapshot) {
        let Some(status_changes) = &self.status_changes else {
            return;
        };

        if status_changes.send(status.clone()).is_err() {
            debug!("Status change dropped: no broadcaster running");
        }
    }
}

impl UpdateEngineService for InMemoryUpdateEngine {
    fn attempt_update(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> Result<(), OperationError> {
        let mut state = self.lock()?;
        if state.status.current_operation != STATUS_IDLE {
            return Err(OperationError::new(format!(
                "Update already in progress: {}",
                state.status.current_operation
            )));
        }

        info!(
            "Update requested (app_version={app_version:?}, omaha_url={omaha_url:?}, flags={flags})"
        );
        state.status.last_checked_time = unix_now();
        state.status.current_operation = STATUS_CHECKING_FOR_UPDATE.to_string();
        self.publish(&state.status);
        Ok(())
    }

    fn attempt_rollback(&self, powerwash: bool) -> Result<(), OperationError> {
        let state = self.lock()?;
        if state.rollback_partition.is_none() {
            return Err(OperationError::new("Rollback partition not available"));
        }

        info!("Rollback requested (powerwash={powerwash})");
        Ok(())
    }

    fn can_rollback(&self) -> Result<bool, OperationError> {
        Ok(self.lock()?.rollback_partition.is_some())
    }

    fn reset_status(&self) -> Result<(), OperationError> {
        let mut state = self.lock()?;
        let last_checked_time = state.status.last_checked_time;
        state.status = idle_status(last_checked_time);
        state.update_completed_at = None;
        self.publish(&state.status);
        Ok(())
    }

    fn get_status(&self) -> Result<StatusSnapshot, OperationError> {
        Ok(self.lock()?.status.clone())
    }

    fn reboot_if_needed(&self) -> Result<(), OperationError> {
        let state = self.lock()?;
        if state.status.current_operation != STATUS_UPDATED_NEED_REBOOT {
            return Err(OperationError::new("Reboot not needed, or attempt failed."));
        }

        info!("Reboot needed to finish update to {}", state.status.new_version);
        Ok(())
    }

    fn set_channel(&self, target_channel: &str, powerwash: bool) -> Result<(), OperationError> {
        if target_channel.trim().is_empty() {
            return Err(OperationError::new("Target channel must not be empty"));
        }

        let mut state = self.lock()?;
        state.target_channel = target_channel.to_string();
        state.powerwash_on_channel_change = powerwash;
        debug!("Target channel set to {target_channel} (powerwash={powerwash})");
        Ok(())
    }

    fn get_channel(&self, get_current_channel: bool) -> Result<String, OperationError> {
        let state = self.lock()?;
        let channel = if get_current_channel {
            &state.current_channel
        } else {
            &state.target_channel
        };
        Ok(channel.clone())
    }

    fn set_p2p_update_permission(&self, enabled: bool) -> Result<(), OperationError> {
        self.lock()?.p2p_update_permission = enabled;
        Ok(())
    }

    fn get_p2p_update_permission(&self) -> Result<bool, OperationError> {
        Ok(self.lock()?.p2p_update_permission)
    }

    fn set_update_over_cellular_permission(&self, enabled: bool) -> Result<(), OperationError> {
        self.lock()?.update_over_cellular_permission = enabled;
        Ok(())
    }

    fn get_update_over_cellular_permission(&self) -> Result<bool, OperationError> {
        Ok(self.lock()?.update_over_cellular_permission)
    }

    fn get_duration_since_update(&self) -> Result<i64, OperationError> {
        let state = self.lock()?;
        let completed_at = state
            .update_completed_at
            .ok_or_else(|| OperationError::new("No pending update"))?;

        Ok(completed_at.elapsed().as_micros() as i64)
    }

    fn get_prev_version(&self) -> Result<String, OperationError> {
        Ok(self.lock()?.prev_version.clone())
    }

    fn get_rollback_partition(&self) -> Result<String, OperationError> {
        self.lock()?
            .rollback_partition
            .clone()
            .ok_or_else(|| OperationError::new("No rollback partition available"))
    }
}

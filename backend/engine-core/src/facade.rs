//! Remote-callable surface of the update engine.
//!
//! [`UpdateEngineFacade`] exposes one method per supported operation. Each decodes its
//! wire arguments, forwards to the backend through [`call_common_handler`], and encodes
//! outputs back to wire form. Output slots follow a fixed per-operation convention:
//!
//! | operation                              | slot written            |
//! |----------------------------------------|-------------------------|
//! | `get_channel`, `get_prev_version`      | always (empty on error) |
//! | `get_status`, `get_rollback_partition` | on success only         |
//! | scalar getters                         | on success only         |
//!
//! The facade also owns the [`SubscriberRegistry`] and is the entry point for both
//! registration and status broadcast.

use crate::codec::{WireStatusSnapshot, WireString, to_native, to_wire};
use crate::dispatch::{WireStatus, call_common_handler};
use crate::registry::{StatusCallback, SubscriberRegistry};
use crate::service::{StatusSnapshot, UpdateEngineService};

use std::sync::Arc;

use log::debug;

/// Wire-level façade over a shared backend and the subscriber registry.
#[derive(Clone)]
pub struct UpdateEngineFacade {
    service: Arc<dyn UpdateEngineService>,
    callbacks: SubscriberRegistry,
}

impl UpdateEngineFacade {
    pub fn new(service: Arc<dyn UpdateEngineService>) -> Self {
        Self {
            service,
            callbacks: SubscriberRegistry::new(),
        }
    }

    fn backend(&self) -> &dyn UpdateEngineService {
        self.service.as_ref()
    }

    pub fn attempt_update(
        &self,
        app_version: &WireString,
        omaha_url: &WireString,
        flags: i32,
    ) -> WireStatus {
        let app_version = to_native(app_version);
        let omaha_url = to_native(omaha_url);

        call_common_handler(self.backend(), (), |service| {
            service.attempt_update(&app_version, &omaha_url, flags)
        })
    }

    pub fn attempt_rollback(&self, powerwash: bool) -> WireStatus {
        call_common_handler(self.backend(), (), |service| {
            service.attempt_rollback(powerwash)
        })
    }

    pub fn can_rollback(&self, out_can_rollback: &mut bool) -> WireStatus {
        call_common_handler(self.backend(), (out_can_rollback,), |service| {
            service.can_rollback().map(|can_rollback| (can_rollback,))
        })
    }

    pub fn reset_status(&self) -> WireStatus {
        call_common_handler(self.backend(), (), |service| service.reset_status())
    }

    pub fn get_status(&self, status: &mut WireStatusSnapshot) -> WireStatus {
        let mut current_operation = String::new();
        let mut new_version = String::new();

        let ret = call_common_handler(
            self.backend(),
            (
                &mut status.last_checked_time,
                &mut status.progress,
                &mut current_operation,
                &mut new_version,
                &mut status.new_size,
            ),
            |service| {
                service.get_status().map(|snapshot| {
                    (
                        snapshot.last_checked_time,
                        snapshot.progress,
                        snapshot.current_operation,
                        snapshot.new_version,
                        snapshot.new_size,
                    )
                })
            },
        );

        if ret.is_ok() {
            status.current_operation = to_wire(&current_operation);
            status.new_version = to_wire(&new_version);
        }

        ret
    }

    pub fn reboot_if_needed(&self) -> WireStatus {
        call_common_handler(self.backend(), (), |service| service.reboot_if_needed())
    }

    pub fn set_channel(&self, target_channel: &WireString, powerwash: bool) -> WireStatus {
        let target_channel = to_native(target_channel);

        call_common_handler(self.backend(), (), |service| {
            service.set_channel(&target_channel, powerwash)
        })
    }

    pub fn get_channel(&self, get_current_channel: bool, out_channel: &mut WireString) -> WireStatus {
        let mut channel = String::new();
        let ret = call_common_handler(self.backend(), (&mut channel,), |service| {
            service.get_channel(get_current_channel).map(|channel| (channel,))
        });

        *out_channel = to_wire(&channel);
        ret
    }

    pub fn set_p2p_update_permission(&self, enabled: bool) -> WireStatus {
        call_common_handler(self.backend(), (), |service| {
            service.set_p2p_update_permission(enabled)
        })
    }

    pub fn get_p2p_update_permission(&self, out_p2p_permission: &mut bool) -> WireStatus {
        call_common_handler(self.backend(), (out_p2p_permission,), |service| {
            service.get_p2p_update_permission().map(|enabled| (enabled,))
        })
    }

    pub fn set_update_over_cellular_permission(&self, enabled: bool) -> WireStatus {
        call_common_handler(self.backend(), (), |service| {
            service.set_update_over_cellular_permission(enabled)
        })
    }

    pub fn get_update_over_cellular_permission(
        &self,
        out_cellular_permission: &mut bool,
    ) -> WireStatus {
        call_common_handler(self.backend(), (out_cellular_permission,), |service| {
            service
                .get_update_over_cellular_permission()
                .map(|enabled| (enabled,))
        })
    }

    pub fn get_duration_since_update(&self, out_duration: &mut i64) -> WireStatus {
        call_common_handler(self.backend(), (out_duration,), |service| {
            service.get_duration_since_update().map(|duration| (duration,))
        })
    }

    pub fn get_prev_version(&self, out_prev_version: &mut WireString) -> WireStatus {
        let mut version = String::new();
        let ret = call_common_handler(self.backend(), (&mut version,), |service| {
            service.get_prev_version().map(|version| (version,))
        });

        *out_prev_version = to_wire(&version);
        ret
    }

    pub fn get_rollback_partition(&self, out_rollback_partition: &mut WireString) -> WireStatus {
        let mut partition = String::new();
        let ret = call_common_handler(self.backend(), (&mut partition,), |service| {
            service.get_rollback_partition().map(|partition| (partition,))
        });

        if ret.is_ok() {
            *out_rollback_partition = to_wire(&partition);
        }

        ret
    }

    /// Add `callback` to the broadcast list. Registration cannot fail.
    pub async fn register_status_callback(&self, callback: Arc<dyn StatusCallback>) -> WireStatus {
        self.callbacks.register(callback).await;
        debug!("Registered status callback");
        WireStatus::Ok
    }

    /// Broadcast a status update to every registered callback.
    pub async fn send_status_update(
        &self,
        last_checked_time: i64,
        progress: f64,
        current_operation: &str,
        new_version: &str,
        new_size: i64,
    ) {
        let snapshot = StatusSnapshot {
            last_checked_time,
            progress,
            current_operation: current_operation.to_string(),
            new_version: new_version.to_string(),
            new_size,
        };

        self.callbacks.broadcast(&snapshot).await;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.callbacks.len().await
    }
}

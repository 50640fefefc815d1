// Test doubles shared by the unit tests: a scripted backend and a recording subscriber.

use crate::registry::StatusCallback;
use crate::service::{OperationError, StatusSnapshot, UpdateEngineService};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

pub(crate) const CURRENT_CHANNEL: &str = "stable-channel";
pub(crate) const TARGET_CHANNEL: &str = "beta-channel";
pub(crate) const PREV_VERSION: &str = "1.2.2";
pub(crate) const ROLLBACK_PARTITION: &str = "/dev/sda5";
pub(crate) const DURATION_SINCE_UPDATE: i64 = 3_600_000_000;

pub(crate) fn sample_status() -> StatusSnapshot {
    StatusSnapshot {
        last_checked_time: 100,
        progress: 0.5,
        current_operation: "DOWNLOADING".to_string(),
        new_version: "1.2.3".to_string(),
        new_size: 5000,
    }
}

/// Backend that answers every operation with fixed values, or fails every operation
/// with one message. Records each call with its inputs.
#[derive(Default)]
pub(crate) struct FakeService {
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub(crate) fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer<T>(&self, call: String, value: T) -> Result<T, OperationError> {
        self.calls.lock().unwrap().push(call);
        match &self.failure {
            Some(message) => Err(OperationError::new(message.clone())),
            None => Ok(value),
        }
    }
}

impl UpdateEngineService for FakeService {
    fn attempt_update(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> Result<(), OperationError> {
        self.answer(
            format!("attempt_update({app_version}, {omaha_url}, {flags})"),
            (),
        )
    }

    fn attempt_rollback(&self, powerwash: bool) -> Result<(), OperationError> {
        self.answer(format!("attempt_rollback({powerwash})"), ())
    }

    fn can_rollback(&self) -> Result<bool, OperationError> {
        self.answer("can_rollback".to_string(), true)
    }

    fn reset_status(&self) -> Result<(), OperationError> {
        self.answer("reset_status".to_string(), ())
    }

    fn get_status(&self) -> Result<StatusSnapshot, OperationError> {
        self.answer("get_status".to_string(), sample_status())
    }

    fn reboot_if_needed(&self) -> Result<(), OperationError> {
        self.answer("reboot_if_needed".to_string(), ())
    }

    fn set_channel(&self, target_channel: &str, powerwash: bool) -> Result<(), OperationError> {
        self.answer(format!("set_channel({target_channel}, {powerwash})"), ())
    }

    fn get_channel(&self, get_current_channel: bool) -> Result<String, OperationError> {
        let channel = if get_current_channel {
            CURRENT_CHANNEL
        } else {
            TARGET_CHANNEL
        };
        self.answer(
            format!("get_channel({get_current_channel})"),
            channel.to_string(),
        )
    }

    fn set_p2p_update_permission(&self, enabled: bool) -> Result<(), OperationError> {
        self.answer(format!("set_p2p_update_permission({enabled})"), ())
    }

    fn get_p2p_update_permission(&self) -> Result<bool, OperationError> {
        self.answer("get_p2p_update_permission".to_string(), true)
    }

    fn set_update_over_cellular_permission(&self, enabled: bool) -> Result<(), OperationError> {
        self.answer(format!("set_update_over_cellular_permission({enabled})"), ())
    }

    fn get_update_over_cellular_permission(&self) -> Result<bool, OperationError> {
        self.answer("get_update_over_cellular_permission".to_string(), true)
    }

    fn get_duration_since_update(&self) -> Result<i64, OperationError> {
        self.answer(
            "get_duration_since_update".to_string(),
            DURATION_SINCE_UPDATE,
        )
    }

    fn get_prev_version(&self) -> Result<String, OperationError> {
        self.answer("get_prev_version".to_string(), PREV_VERSION.to_string())
    }

    fn get_rollback_partition(&self) -> Result<String, OperationError> {
        self.answer(
            "get_rollback_partition".to_string(),
            ROLLBACK_PARTITION.to_string(),
        )
    }
}

/// Shared delivery log: (subscriber name, snapshot) in arrival order.
pub(crate) type DeliveryLog = Arc<Mutex<Vec<(String, StatusSnapshot)>>>;

/// Subscriber that appends every push to a shared [`DeliveryLog`].
///
/// Its connection "dies" when the paired [`DeathTrigger`] fires or is dropped.
pub(crate) struct RecordingCallback {
    name: String,
    log: DeliveryLog,
    death: Mutex<Option<oneshot::Receiver<()>>>,
}

pub(crate) struct DeathTrigger(oneshot::Sender<()>);

impl DeathTrigger {
    pub(crate) fn fire(self) {
        let _ = self.0.send(());
    }
}

impl RecordingCallback {
    pub(crate) fn new(name: &str, log: &DeliveryLog) -> (Arc<dyn StatusCallback>, DeathTrigger) {
        let (tx, rx) = oneshot::channel();
        let callback = Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
            death: Mutex::new(Some(rx)),
        });
        (callback, DeathTrigger(tx))
    }
}

impl StatusCallback for RecordingCallback {
    fn handle_status_update(&self, snapshot: &StatusSnapshot) {
        self.log
            .lock()
            .unwrap()
            .push((self.name.clone(), snapshot.clone()));
    }

    fn death_watch(&self) -> BoxFuture<'static, ()> {
        match self.death.lock().unwrap().take() {
            Some(rx) => async move {
                let _ = rx.await;
            }
            .boxed(),
            None => futures_util::future::pending().boxed(),
        }
    }
}

pub(crate) fn new_log() -> DeliveryLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn delivered_to(log: &DeliveryLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|(name, _)| name.clone())
        .collect()
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub(crate) async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 2s");
}

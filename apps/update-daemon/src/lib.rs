// Library exports for testing
// The binary (main.rs) imports these as well

pub mod error;
pub mod logger;
pub mod memory_service;

use crate::error::DaemonError;
use crate::memory_service::InMemoryUpdateEngine;

use engine_core::config::DaemonConfig;
use engine_core::facade::UpdateEngineFacade;
use engine_core::ipc::{IpcServerHandle, start_ipc_server};
use engine_core::service::StatusSnapshot;

use std::sync::Arc;

use log::info;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

/// The façade and the IPC server exposing it.
pub struct RunningDaemon {
    pub facade: UpdateEngineFacade,
    pub ipc: IpcServerHandle,
}

/// Build the in-memory backend and façade, then start the IPC server from `config`.
///
/// Backend status changes are forwarded to the façade's broadcast by a spawned task, so
/// registered status callbacks see every change in order.
///
/// # Errors
///
/// Returns [`DaemonError::Core`] if the IPC server cannot bind its port.
pub async fn start(config: &DaemonConfig) -> Result<RunningDaemon, DaemonError> {
    let (status_tx, status_rx) = unbounded_channel();
    let facade = UpdateEngineFacade::new(Arc::new(InMemoryUpdateEngine::with_status_notifier(
        status_tx,
    )));
    tokio::spawn(forward_status_changes(status_rx, facade.clone()));

    let ipc = start_ipc_server(&config.ipc, facade.clone()).await?;
    info!("IPC server started on port {}", ipc.port());

    Ok(RunningDaemon { facade, ipc })
}

async fn forward_status_changes(
    mut status_rx: UnboundedReceiver<StatusSnapshot>,
    facade: UpdateEngineFacade,
) {
    while let Some(status) = status_rx.recv().await {
        facade
            .send_status_update(
                status.last_checked_time,
                status.progress,
                &status.current_operation,
                &status.new_version,
                status.new_size,
            )
            .await;
    }
}

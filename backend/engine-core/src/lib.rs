//! IPC command façade for the update engine.
//!
//! Remote callers reach the update engine backend through [`facade::UpdateEngineFacade`];
//! status changes are fanned out to registered subscribers through
//! [`registry::SubscriberRegistry`]. The [`ipc`] module serves the façade over a
//! localhost WebSocket.
//!
//! Layering, leaves first:
//!
//! - [`codec`]: transport text ↔ backend strings
//! - [`dispatch`]: backend call → [`dispatch::WireStatus`]
//! - [`registry`]: liveness-tracked subscriber list
//! - [`facade`]: one entry point per operation, registration and broadcast

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod ipc;
pub mod proto;
pub mod registry;
pub mod service;

#[cfg(test)]
mod tests;

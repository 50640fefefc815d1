mod callback;
mod connection_state;
mod dispatch;
mod registry;
mod support;

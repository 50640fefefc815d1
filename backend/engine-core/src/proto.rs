//! IPC protocol messages.
//!
//! Binary protobuf over WebSocket. Messages are declared with prost derives so the
//! protocol lives next to the code that speaks it.
//!
//! - `IpcClientMessage`: client → server, one payload per facade operation
//! - `IpcServerMessage`: server → client, call responses and status pushes
//!
//! Text arguments and results travel as `bytes` holding UTF-16LE code units
//! (see [`WireString`](crate::codec::WireString)). Status pushes use `request_id` 0.

/// Request ID reserved for the auth handshake.
pub const AUTH_REQUEST_ID: u64 = 1;

/// Request ID carried by unsolicited status pushes.
pub const STATUS_UPDATE_REQUEST_ID: u64 = 0;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcClientMessage {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(
        oneof = "ipc_client_message::Payload",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18"
    )]
    pub payload: ::core::option::Option<ipc_client_message::Payload>,
}

pub mod ipc_client_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        AuthHandshake(super::IpcAuthHandshake),
        #[prost(message, tag = "3")]
        AttemptUpdate(super::IpcAttemptUpdateRequest),
        #[prost(message, tag = "4")]
        AttemptRollback(super::IpcAttemptRollbackRequest),
        #[prost(message, tag = "5")]
        CanRollback(super::IpcEmptyRequest),
        #[prost(message, tag = "6")]
        ResetStatus(super::IpcEmptyRequest),
        #[prost(message, tag = "7")]
        GetStatus(super::IpcEmptyRequest),
        #[prost(message, tag = "8")]
        RebootIfNeeded(super::IpcEmptyRequest),
        #[prost(message, tag = "9")]
        SetChannel(super::IpcSetChannelRequest),
        #[prost(message, tag = "10")]
        GetChannel(super::IpcGetChannelRequest),
        #[prost(message, tag = "11")]
        SetP2pUpdatePermission(super::IpcSetPermissionRequest),
        #[prost(message, tag = "12")]
        GetP2pUpdatePermission(super::IpcEmptyRequest),
        #[prost(message, tag = "13")]
        SetUpdateOverCellularPermission(super::IpcSetPermissionRequest),
        #[prost(message, tag = "14")]
        GetUpdateOverCellularPermission(super::IpcEmptyRequest),
        #[prost(message, tag = "15")]
        GetDurationSinceUpdate(super::IpcEmptyRequest),
        #[prost(message, tag = "16")]
        GetPrevVersion(super::IpcEmptyRequest),
        #[prost(message, tag = "17")]
        GetRollbackPartition(super::IpcEmptyRequest),
        #[prost(message, tag = "18")]
        RegisterStatusCallback(super::IpcEmptyRequest),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcAuthHandshake {
    #[prost(string, tag = "1")]
    pub token: ::prost::alloc::string::String,
}

/// Request with no arguments.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcEmptyRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcAttemptUpdateRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub app_version: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub omaha_url: ::prost::alloc::vec::Vec<u8>,
    #[prost(int32, tag = "3")]
    pub flags: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcAttemptRollbackRequest {
    #[prost(bool, tag = "1")]
    pub powerwash: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcSetChannelRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub target_channel: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "2")]
    pub powerwash: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcGetChannelRequest {
    #[prost(bool, tag = "1")]
    pub get_current_channel: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcSetPermissionRequest {
    #[prost(bool, tag = "1")]
    pub enabled: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcServerMessage {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(oneof = "ipc_server_message::Payload", tags = "2, 3, 4, 5")]
    pub payload: ::core::option::Option<ipc_server_message::Payload>,
}

pub mod ipc_server_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        AuthHandshakeResponse(super::IpcAuthHandshakeResponse),
        #[prost(message, tag = "3")]
        Error(super::IpcErrorResponse),
        #[prost(message, tag = "4")]
        CallResponse(super::IpcCallResponse),
        #[prost(message, tag = "5")]
        StatusUpdate(super::IpcStatusSnapshot),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcAuthHandshakeResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, optional, tag = "2")]
    pub error: ::core::option::Option<::prost::alloc::string::String>,
}

/// Transport-level failure: the request never reached the backend.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcErrorResponse {
    #[prost(enumeration = "IpcErrorCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum IpcErrorCode {
    Unspecified = 0,
    AuthError = 1,
    InvalidMessage = 2,
    InternalError = 3,
}

/// Result of one facade call.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcCallResponse {
    #[prost(message, optional, tag = "1")]
    pub status: ::core::option::Option<IpcStatus>,
    #[prost(oneof = "ipc_call_response::Output", tags = "2, 3, 4, 5")]
    pub output: ::core::option::Option<ipc_call_response::Output>,
}

pub mod ipc_call_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Output {
        #[prost(bool, tag = "2")]
        BoolValue(bool),
        #[prost(int64, tag = "3")]
        Int64Value(i64),
        #[prost(bytes, tag = "4")]
        StringValue(::prost::alloc::vec::Vec<u8>),
        #[prost(message, tag = "5")]
        Status(super::IpcStatusSnapshot),
    }
}

/// Wire status: `code` 0 is success, anything else a service-specific error.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpcStatusSnapshot {
    #[prost(int64, tag = "1")]
    pub last_checked_time: i64,
    #[prost(double, tag = "2")]
    pub progress: f64,
    #[prost(bytes = "vec", tag = "3")]
    pub current_operation: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub new_version: ::prost::alloc::vec::Vec<u8>,
    #[prost(int64, tag = "5")]
    pub new_size: i64,
}

//! Uniform forwarding of backend calls to wire results.
//!
//! [`call_common_handler`] runs one backend operation and folds its outcome into a
//! [`WireStatus`]. Inputs are captured by the handler closure, outputs are described by
//! an [`OutputSlots`] tuple of `&mut` references, so any operation signature goes through
//! the same path with no per-operation glue beyond the call site.

use crate::service::OperationError;

use log::warn;

/// The single error code used for every backend failure.
pub const SERVICE_SPECIFIC_ERROR_CODE: i32 = 1;

/// Outcome of a remote call as it crosses the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireStatus {
    Ok,
    ServiceSpecific { code: i32, message: String },
}

impl WireStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, WireStatus::Ok)
    }

    /// Service-specific code, `0` on success.
    pub fn code(&self) -> i32 {
        match self {
            WireStatus::Ok => 0,
            WireStatus::ServiceSpecific { code, .. } => *code,
        }
    }

    /// Error message, empty on success.
    pub fn message(&self) -> &str {
        match self {
            WireStatus::Ok => "",
            WireStatus::ServiceSpecific { message, .. } => message,
        }
    }
}

impl From<OperationError> for WireStatus {
    fn from(error: OperationError) -> Self {
        WireStatus::ServiceSpecific {
            code: SERVICE_SPECIFIC_ERROR_CODE,
            message: error.message().to_string(),
        }
    }
}

/// Caller-owned destinations for an operation's outputs.
///
/// Implemented for `()` and for tuples of up to five `&mut T`. `Values` is the matching
/// tuple of owned values the backend produces.
pub trait OutputSlots {
    type Values;

    /// Write every value into its slot.
    fn commit(self, values: Self::Values);
}

impl OutputSlots for () {
    type Values = ();

    fn commit(self, _values: Self::Values) {}
}

macro_rules! impl_output_slots {
    ($($slot:ident => $value:ident : $ty:ident),+) => {
        impl<'a, $($ty),+> OutputSlots for ($(&'a mut $ty,)+) {
            type Values = ($($ty,)+);

            fn commit(self, values: Self::Values) {
                let ($($slot,)+) = self;
                let ($($value,)+) = values;
                $(*$slot = $value;)+
            }
        }
    };
}

impl_output_slots!(a => va: A);
impl_output_slots!(a => va: A, b => vb: B);
impl_output_slots!(a => va: A, b => vb: B, c => vc: C);
impl_output_slots!(a => va: A, b => vb: B, c => vc: C, d => vd: D);
impl_output_slots!(a => va: A, b => vb: B, c => vc: C, d => vd: D, e => ve: E);

/// Invoke `handler` against `service` once and convert the outcome.
///
/// On success the produced values are written into `slots` and [`WireStatus::Ok`] is
/// returned. On failure the slots are left untouched and the error's message is returned
/// under [`SERVICE_SPECIFIC_ERROR_CODE`]. No retries.
pub fn call_common_handler<S, O, F>(service: &S, slots: O, handler: F) -> WireStatus
where
    S: ?Sized,
    O: OutputSlots,
    F: FnOnce(&S) -> Result<O::Values, OperationError>,
{
    match handler(service) {
        Ok(values) => {
            slots.commit(values);
            WireStatus::Ok
        }
        Err(error) => {
            warn!("Backend operation failed: {error}");
            WireStatus::from(error)
        }
    }
}

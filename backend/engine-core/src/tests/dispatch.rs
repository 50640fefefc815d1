// Unit tests for the dispatch adapter
// Covers zero, one and many output slots, on both success and failure

use crate::dispatch::{OutputSlots, SERVICE_SPECIFIC_ERROR_CODE, WireStatus, call_common_handler};
use crate::service::OperationError;

use std::cell::Cell;

struct Counter {
    calls: Cell<u32>,
}

impl Counter {
    fn new() -> Self {
        Self {
            calls: Cell::new(0),
        }
    }

    fn bump(&self) -> u32 {
        self.calls.set(self.calls.get() + 1);
        self.calls.get()
    }
}

/// **VALUE**: Verifies a successful call with no outputs yields `WireStatus::Ok`.
///
/// **BUG THIS CATCHES**: Would catch the adapter skipping or repeating the backend call.
#[test]
fn given_successful_operation_without_outputs_when_called_then_returns_ok_once() {
    let counter = Counter::new();

    let status = call_common_handler(&counter, (), |counter| {
        counter.bump();
        Ok(())
    });

    assert_eq!(status, WireStatus::Ok);
    assert_eq!(counter.calls.get(), 1, "Backend must be invoked exactly once");
}

/// **VALUE**: Verifies every declared output slot receives the backend's value.
///
/// **WHY THIS MATTERS**: The status query writes five outputs through this path. A slot
/// left at its default would ship a zeroed status to remote callers.
#[test]
fn given_successful_operation_with_outputs_when_called_then_all_slots_written() {
    let counter = Counter::new();
    let mut time = 0_i64;
    let mut progress = 0.0_f64;
    let mut operation = String::new();
    let mut version = String::new();
    let mut size = 0_i64;

    let status = call_common_handler(
        &counter,
        (&mut time, &mut progress, &mut operation, &mut version, &mut size),
        |_| {
            Ok((
                100_i64,
                0.5_f64,
                "DOWNLOADING".to_string(),
                "1.2.3".to_string(),
                5000_i64,
            ))
        },
    );

    assert!(status.is_ok());
    assert_eq!(time, 100);
    assert_eq!(progress, 0.5);
    assert_eq!(operation, "DOWNLOADING");
    assert_eq!(version, "1.2.3");
    assert_eq!(size, 5000);
}

/// **VALUE**: Verifies failures carry the fixed code and the exact backend message,
/// and leave output slots untouched.
///
/// **WHY THIS MATTERS**: Callers can only tell failures apart by message text, and
/// slots must not hold half-written values after an error.
///
/// **BUG THIS CATCHES**: Would catch the message being reformatted, or outputs
/// being committed before the result is checked.
#[test]
fn given_failing_operation_when_called_then_returns_service_specific_error_and_keeps_slots() {
    let counter = Counter::new();
    let mut can_rollback = false;
    let mut channel = String::from("untouched");

    let status = call_common_handler(&counter, (&mut can_rollback, &mut channel), |_| {
        Err(OperationError::new("no update in progress"))
    });

    assert_eq!(
        status,
        WireStatus::ServiceSpecific {
            code: SERVICE_SPECIFIC_ERROR_CODE,
            message: "no update in progress".to_string(),
        }
    );
    assert_eq!(status.code(), 1);
    assert_eq!(status.message(), "no update in progress");
    assert!(!can_rollback);
    assert_eq!(channel, "untouched");
}

#[test]
fn given_inputs_captured_by_handler_when_called_then_backend_sees_them() {
    let counter = Counter::new();
    let app_version = String::from("1.2.3");
    let flags = 4;
    let mut echoed = String::new();

    let status = call_common_handler(&counter, (&mut echoed,), |_| {
        Ok((format!("{app_version}/{flags}"),))
    });

    assert!(status.is_ok());
    assert_eq!(echoed, "1.2.3/4");
}

#[test]
fn given_ok_status_then_code_is_zero_and_message_empty() {
    assert_eq!(WireStatus::Ok.code(), 0);
    assert_eq!(WireStatus::Ok.message(), "");
}

#[test]
fn given_tuple_slots_when_committed_then_values_land_in_order() {
    let mut first = 0_u8;
    let mut second = false;
    let mut third = String::new();

    (&mut first, &mut second, &mut third).commit((7_u8, true, "x".to_string()));

    assert_eq!((first, second, third.as_str()), (7, true, "x"));
}

#[test]
fn given_operation_error_when_converted_then_uses_fixed_code() {
    let status = WireStatus::from(OperationError::new("boom"));

    assert_eq!(status.code(), SERVICE_SPECIFIC_ERROR_CODE);
    assert!(!status.is_ok());
}

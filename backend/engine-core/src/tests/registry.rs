// Unit tests for the subscriber registry
// Tests ordering, handle identity, idempotent removal, liveness-driven removal
// and concurrent registration

use crate::registry::{StatusCallback, SubscriberRegistry};
use crate::tests::support::{
    DeliveryLog, RecordingCallback, delivered_to, eventually, new_log, sample_status,
};

use std::collections::HashMap;
use std::sync::Arc;

fn callback(name: &str, log: &DeliveryLog) -> Arc<dyn StatusCallback> {
    // Dropping the trigger would count as a death; leak it so the watch stays pending.
    let (callback, death) = RecordingCallback::new(name, log);
    std::mem::forget(death);
    callback
}

/// **VALUE**: Verifies broadcast order equals registration order.
///
/// **WHY THIS MATTERS**: Insertion order is the only ordering guarantee subscribers get.
///
/// **BUG THIS CATCHES**: Would catch a switch to an unordered container.
#[tokio::test]
async fn given_registered_subscribers_when_broadcast_then_all_receive_in_registration_order() {
    let registry = SubscriberRegistry::new();
    let log = new_log();

    for name in ["a", "b", "c", "d"] {
        registry.register(callback(name, &log)).await;
    }

    registry.broadcast(&sample_status()).await;

    assert_eq!(registry.len().await, 4);
    assert_eq!(delivered_to(&log), vec!["a", "b", "c", "d"]);
}

/// **VALUE**: Register A, B, C; remove B; broadcast → A and C get exactly the snapshot.
#[tokio::test]
async fn given_middle_subscriber_removed_when_broadcast_then_only_remaining_receive() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    let a = callback("a", &log);
    let b = callback("b", &log);
    let c = callback("c", &log);
    registry.register(Arc::clone(&a)).await;
    registry.register(Arc::clone(&b)).await;
    registry.register(Arc::clone(&c)).await;

    registry.remove(&b).await;
    registry.broadcast(&sample_status()).await;

    let deliveries = log.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0], ("a".to_string(), sample_status()));
    assert_eq!(deliveries[1], ("c".to_string(), sample_status()));
}

/// **VALUE**: Removing an unknown handle is a logged no-op.
///
/// **WHY THIS MATTERS**: Death notifications can race with other removals. A panic or
/// error here would take down the task delivering the notification.
#[tokio::test]
async fn given_unknown_handle_when_removed_then_registry_unchanged() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    registry.register(callback("a", &log)).await;
    let stranger = callback("stranger", &log);

    registry.remove(&stranger).await;

    assert_eq!(registry.len().await, 1);
}

/// **VALUE**: Removing the same handle twice equals removing it once.
///
/// **BUG THIS CATCHES**: Would catch the second removal erasing some other entry.
#[tokio::test]
async fn given_handle_removed_twice_then_second_removal_has_no_effect() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    let a = callback("a", &log);
    let b = callback("b", &log);
    registry.register(Arc::clone(&a)).await;
    registry.register(Arc::clone(&b)).await;

    registry.remove(&a).await;
    registry.remove(&a).await;
    registry.broadcast(&sample_status()).await;

    assert_eq!(registry.len().await, 1);
    assert_eq!(delivered_to(&log), vec!["b"]);
}

/// **VALUE**: Identity is the handle, not its contents.
///
/// **BUG THIS CATCHES**: Would catch removal matching a different handle that happens
/// to look the same.
#[tokio::test]
async fn given_lookalike_handles_when_one_removed_then_other_stays() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    let first = callback("twin", &log);
    let second = callback("twin", &log);
    registry.register(Arc::clone(&first)).await;
    registry.register(Arc::clone(&second)).await;

    registry.remove(&second).await;
    registry.broadcast(&sample_status()).await;

    assert_eq!(registry.len().await, 1);
    assert_eq!(delivered_to(&log), vec!["twin"]);
    registry.remove(&first).await;
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn given_same_handle_registered_twice_then_two_entries_receive() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    let a = callback("a", &log);

    registry.register(Arc::clone(&a)).await;
    registry.register(Arc::clone(&a)).await;
    registry.broadcast(&sample_status()).await;

    assert_eq!(registry.len().await, 2);
    assert_eq!(delivered_to(&log), vec!["a", "a"]);

    registry.remove(&a).await;
    assert_eq!(registry.len().await, 1, "One removal erases one entry");
}

/// **VALUE**: Verifies the liveness watch removes a subscriber when its connection dies.
///
/// **WHY THIS MATTERS**: There is no explicit unregister. Without the watch, dead
/// subscribers accumulate forever and every broadcast pays for them.
///
/// **BUG THIS CATCHES**: Would catch the watch task never being spawned, or removing
/// the wrong entry.
#[tokio::test]
async fn given_subscriber_connection_dies_when_watch_fires_then_subscriber_removed() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    let (a, _a_death) = RecordingCallback::new("a", &log);
    let (b, b_death) = RecordingCallback::new("b", &log);
    let (c, _c_death) = RecordingCallback::new("c", &log);
    registry.register(a).await;
    registry.register(b).await;
    registry.register(c).await;

    b_death.fire();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.len().await == 2 }
    })
    .await;

    registry.broadcast(&sample_status()).await;
    assert_eq!(delivered_to(&log), vec!["a", "c"]);
}

/// **VALUE**: N concurrent registrations followed by one broadcast deliver to each
/// subscriber exactly once.
///
/// **BUG THIS CATCHES**: Would catch lost appends under contention (missing delivery)
/// or a broadcast iterating a sequence mid-mutation (duplicate delivery).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_registrations_when_broadcast_then_each_receives_exactly_once() {
    const SUBSCRIBERS: usize = 64;
    let registry = SubscriberRegistry::new();
    let log = new_log();

    let tasks: Vec<_> = (0..SUBSCRIBERS)
        .map(|i| {
            let registry = registry.clone();
            let cb = callback(&format!("sub-{i}"), &log);
            tokio::spawn(async move { registry.register(cb).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("registration task panicked");
    }

    registry.broadcast(&sample_status()).await;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in delivered_to(&log) {
        *counts.entry(name).or_default() += 1;
    }
    assert_eq!(registry.len().await, SUBSCRIBERS);
    assert_eq!(counts.len(), SUBSCRIBERS, "Every subscriber must receive");
    assert!(counts.values().all(|&n| n == 1), "No duplicate delivery");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_removal_racing_broadcast_then_registry_stays_consistent() {
    let registry = SubscriberRegistry::new();
    let log = new_log();
    let handles: Vec<_> = (0..32).map(|i| callback(&format!("sub-{i}"), &log)).collect();
    for handle in &handles {
        registry.register(Arc::clone(handle)).await;
    }

    let remover = {
        let registry = registry.clone();
        let doomed: Vec<_> = handles.iter().step_by(2).cloned().collect();
        tokio::spawn(async move {
            for handle in &doomed {
                registry.remove(handle).await;
            }
        })
    };
    for _ in 0..8 {
        registry.broadcast(&sample_status()).await;
    }
    remover.await.expect("remover panicked");

    assert_eq!(registry.len().await, 16);
    log.lock().unwrap().clear();
    registry.broadcast(&sample_status()).await;
    let survivors = delivered_to(&log);
    assert_eq!(survivors.len(), 16);
    assert!(survivors.iter().all(|name| {
        let index: usize = name.trim_start_matches("sub-").parse().unwrap();
        index % 2 == 1
    }));
}

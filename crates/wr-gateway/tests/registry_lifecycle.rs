//! Session registry lifecycle tests
//!
//! Drives the registry through activation, pairing, timeout, deactivation
//! and teardown with scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;

use common::{settle, Harness};
use wr_core::{BridgeError, Notification, PairingEvent, Phone, SessionView};

fn code(n: u32) -> PairingEvent {
    PairingEvent::Code(format!("ref-{}@628", n))
}

fn spawn_activate(h: &Harness, phone: &Phone) -> JoinHandle<Result<SessionView, BridgeError>> {
    let registry = Arc::clone(&h.registry);
    let phone = phone.clone();
    tokio::spawn(async move { registry.activate(&phone).await })
}

#[tokio::test]
async fn test_activate_paired_tenant_connects() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);

    let view = h.registry.activate(&phone).await.unwrap();

    assert!(view.active);
    assert!(view.authenticated);
    assert_eq!(h.sink.for_phone(&phone), vec![Notification::Connected]);
    assert_eq!(h.store.writes(), vec![(phone.clone(), true)]);
    assert!(h.registry.check_authentication(&phone).await.unwrap());
    assert!(!h.registry.is_pairing(&phone).await);
    assert_eq!(h.connector.connections()[0].connects(), 1);
}

#[tokio::test]
async fn test_activate_is_idempotent() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    let first = h.registry.activate(&phone).await.unwrap();
    let second = h.registry.activate(&phone).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.connector.opens(), 1);
    assert_eq!(h.registry.len().await, 1);
    assert!(h.registry.is_pairing(&phone).await);
}

#[tokio::test]
async fn test_activate_paired_tenant_twice_notifies_once() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);

    h.registry.activate(&phone).await.unwrap();
    h.registry.activate(&phone).await.unwrap();

    assert_eq!(h.sink.for_phone(&phone), vec![Notification::Connected]);
    assert_eq!(h.connector.opens(), 1);
}

#[tokio::test]
async fn test_concurrent_activate_waits_for_connect() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);
    let gate = h.connector.hold_connect(&phone);

    let first = spawn_activate(&h, &phone);
    settle().await;
    let second = spawn_activate(&h, &phone);
    settle().await;
    assert!(!second.is_finished());

    gate.notify_one();
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    assert_eq!(a.id, b.id);
    assert!(b.active && b.authenticated);
    assert_eq!(h.connector.opens(), 1);
    assert_eq!(h.sink.for_phone(&phone), vec![Notification::Connected]);
}

#[tokio::test]
async fn test_concurrent_activate_retries_after_failed_connect() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);
    h.connector.refuse_connect(&phone);
    let gate = h.connector.hold_connect(&phone);

    let first = spawn_activate(&h, &phone);
    settle().await;
    let second = spawn_activate(&h, &phone);
    settle().await;
    assert!(!second.is_finished());

    gate.notify_one();
    assert!(matches!(first.await.unwrap(), Err(BridgeError::Connection(_))));
    assert!(matches!(second.await.unwrap(), Err(BridgeError::Connection(_))));

    // The waiter made its own attempt instead of reporting the evicted session
    assert_eq!(h.connector.opens(), 2);
    assert!(!h.registry.check_activation(&phone).await);
    assert!(h.sink.for_phone(&phone).is_empty());
}

#[tokio::test]
async fn test_check_activation_follows_lifecycle() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    assert!(!h.registry.check_activation(&phone).await);

    h.registry.activate(&phone).await.unwrap();
    assert!(h.registry.check_activation(&phone).await);

    assert!(h.registry.deactivate(&phone).await);
    assert!(!h.registry.check_activation(&phone).await);
}

#[tokio::test]
async fn test_pairing_codes_then_success() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    let view = h.registry.activate(&phone).await.unwrap();
    assert!(view.active);
    assert!(!view.authenticated);
    assert_eq!(h.store.writes(), vec![(phone.clone(), false)]);

    h.connector.emit(&phone, code(1));
    h.connector.emit(&phone, code(2));
    let sent = h.sink.wait_for(&phone, 2).await;

    let paths: Vec<&str> = sent
        .iter()
        .filter_map(|n| match n {
            Notification::Authenticating { qr_path } => Some(qr_path.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0], paths[1]);
    assert_eq!(h.renderer.codes(), vec!["ref-1@628", "ref-2@628"]);

    // Nothing is authenticated until the device confirms
    assert!(!h.registry.get(&phone).await.unwrap().authenticated);
    assert!(!h.registry.check_authentication(&phone).await.unwrap());

    h.connector.emit(&phone, PairingEvent::Success);
    let sent = h.sink.wait_for(&phone, 3).await;

    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2], Notification::Authenticated);
    assert!(h.registry.get(&phone).await.unwrap().authenticated);
    assert!(h.registry.check_authentication(&phone).await.unwrap());
    assert!(!h.registry.is_pairing(&phone).await);
    assert_eq!(
        h.store.writes(),
        vec![(phone.clone(), false), (phone.clone(), true)]
    );
}

#[tokio::test]
async fn test_unknown_pairing_events_are_ignored() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    h.registry.activate(&phone).await.unwrap();
    h.connector.emit(&phone, PairingEvent::Other("error".into()));
    h.connector.emit(&phone, code(1));

    let sent = h.sink.wait_for(&phone, 1).await;
    assert!(matches!(sent[0], Notification::Authenticating { .. }));
    assert!(h.registry.is_pairing(&phone).await);
}

#[tokio::test]
async fn test_pairing_timeout() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    let first = h.registry.activate(&phone).await.unwrap();
    h.connector.emit(&phone, code(1));
    h.connector.emit(&phone, PairingEvent::Timeout);

    let sent = h.sink.wait_for(&phone, 2).await;
    assert!(matches!(sent[0], Notification::Authenticating { .. }));
    assert_eq!(sent[1], Notification::Timeout { code: 408 });

    h.wait_until_not_pairing(&phone).await;
    assert!(!h.registry.check_authentication(&phone).await.unwrap());
    assert!(!h.registry.get(&phone).await.unwrap().authenticated);
    assert_eq!(h.connector.connections()[0].disconnects(), 1);

    // A timed-out tenant can be activated again with a fresh handshake
    let second = h.registry.activate(&phone).await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(h.connector.opens(), 2);
    assert!(h.registry.is_pairing(&phone).await);
    assert!(h.connector.connections()[0].is_released());

    h.connector.emit(&phone, code(2));
    let sent = h.sink.wait_for(&phone, 3).await;
    assert!(matches!(sent[2], Notification::Authenticating { .. }));
}

#[tokio::test]
async fn test_deactivate_unknown_phone() {
    let h = Harness::new();
    let phone = Phone::new("628999");

    assert!(!h.registry.deactivate(&phone).await);
    assert!(h.sink.sent().is_empty());
    assert!(h.store.writes().is_empty());
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_deactivate_twice() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);

    h.registry.activate(&phone).await.unwrap();
    assert!(h.registry.deactivate(&phone).await);
    assert!(h.registry.deactivate(&phone).await);

    let conn = &h.connector.connections()[0];
    assert_eq!(conn.disconnects(), 1);
    assert!(conn.is_released());
}

#[tokio::test]
async fn test_deactivate_during_pairing_stops_it() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    h.registry.activate(&phone).await.unwrap();
    h.connector.emit(&phone, code(1));
    h.sink.wait_for(&phone, 1).await;

    assert!(h.registry.deactivate(&phone).await);
    assert!(!h.registry.is_pairing(&phone).await);

    h.connector.emit(&phone, PairingEvent::Success);
    settle().await;

    assert_eq!(h.sink.for_phone(&phone).len(), 1);
    assert!(!h.registry.get(&phone).await.unwrap().authenticated);
    assert!(!h.registry.check_authentication(&phone).await.unwrap());
    assert!(!h.registry.check_activation(&phone).await);
}

#[tokio::test]
async fn test_reactivate_after_deactivate() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    let first = h.registry.activate(&phone).await.unwrap();
    h.registry.deactivate(&phone).await;
    let second = h.registry.activate(&phone).await.unwrap();

    assert_ne!(first.id, second.id);
    assert!(second.active);
    assert_eq!(h.registry.len().await, 1);
}

#[tokio::test]
async fn test_pending_handshake_does_not_block_other_tenants() {
    let h = Harness::new();
    let pairing = Phone::new("628111");
    let paired = Phone::new("628222");
    h.connector.add_credential(&paired);

    // Never emits anything
    h.registry.activate(&pairing).await.unwrap();

    let view = timeout(Duration::from_secs(1), h.registry.activate(&paired))
        .await
        .expect("activation blocked by another tenant's handshake")
        .unwrap();
    assert!(view.authenticated);

    let (third, fourth) = (Phone::new("628333"), Phone::new("628444"));
    let (a, b) = tokio::join!(h.registry.activate(&third), h.registry.activate(&fourth));
    assert!(a.unwrap().active);
    assert!(b.unwrap().active);
    assert_eq!(h.registry.len().await, 4);
}

#[tokio::test]
async fn test_connect_failure_leaves_no_session() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);
    h.connector.refuse_connect(&phone);

    let err = h.registry.activate(&phone).await.unwrap_err();

    assert!(matches!(err, BridgeError::Connection(_)));
    assert!(!h.registry.check_activation(&phone).await);
    assert!(h.registry.get(&phone).await.is_none());
    assert!(h.sink.sent().is_empty());
    assert!(h.connector.connections()[0].is_released());
}

#[tokio::test]
async fn test_connect_failure_during_pairing_leaves_no_session() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.refuse_connect(&phone);

    assert!(h.registry.activate(&phone).await.is_err());
    assert!(h.registry.get(&phone).await.is_none());
    assert!(!h.registry.is_pairing(&phone).await);
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_aborts_activation() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);
    h.store.fail_writes(true);

    let err = h.registry.activate(&phone).await.unwrap_err();

    assert!(matches!(err, BridgeError::Persistence(_)));
    assert!(!h.registry.check_activation(&phone).await);
    assert!(h.sink.sent().is_empty());

    h.store.fail_writes(false);
    assert!(h.registry.activate(&phone).await.unwrap().active);
}

#[tokio::test]
async fn test_authentication_check_reads_the_store() {
    let h = Harness::new();
    let phone = Phone::new("628111");

    h.registry.activate(&phone).await.unwrap();
    h.store.fail_writes(true);
    h.connector.emit(&phone, PairingEvent::Success);

    let sent = h.sink.wait_for(&phone, 1).await;
    assert_eq!(sent[0], Notification::Authenticated);
    assert!(h.registry.get(&phone).await.unwrap().authenticated);
    assert!(!h.registry.check_authentication(&phone).await.unwrap());
}

#[tokio::test]
async fn test_list_is_sorted_by_phone() {
    let h = Harness::new();
    for raw in ["628333", "628111", "628222"] {
        h.registry.activate(&Phone::new(raw)).await.unwrap();
    }
    h.registry.deactivate(&Phone::new("628222")).await;

    let listed = h.registry.list().await;
    let phones: Vec<&str> = listed.iter().map(|v| v.phone.as_str()).collect();
    assert_eq!(phones, vec!["628111", "628222", "628333"]);
    assert!(!listed[1].active);
}

#[tokio::test]
async fn test_forget_erases_tenant() {
    let h = Harness::new();
    let phone = Phone::new("628111");
    h.connector.add_credential(&phone);

    h.registry.activate(&phone).await.unwrap();
    assert!(h.registry.forget(&phone).await.unwrap());

    assert!(h.registry.get(&phone).await.is_none());
    assert!(!h.registry.check_authentication(&phone).await.unwrap());
    assert_eq!(h.connector.forgotten(), vec![phone.clone()]);

    // Without its credential the next activation pairs again
    let view = h.registry.activate(&phone).await.unwrap();
    assert!(!view.authenticated);
    assert!(h.registry.is_pairing(&phone).await);
}

#[tokio::test]
async fn test_forget_unknown_phone() {
    let h = Harness::new();
    assert!(!h.registry.forget(&Phone::new("628999")).await.unwrap());
}

#[tokio::test]
async fn test_shutdown_deactivates_everything() {
    let h = Harness::new();
    let pairing = Phone::new("628111");
    let paired = Phone::new("628222");
    h.connector.add_credential(&paired);

    h.registry.activate(&pairing).await.unwrap();
    h.registry.activate(&paired).await.unwrap();

    timeout(Duration::from_secs(2), h.registry.shutdown())
        .await
        .expect("shutdown did not finish");

    assert!(!h.registry.check_activation(&pairing).await);
    assert!(!h.registry.check_activation(&paired).await);
    assert!(!h.registry.is_pairing(&pairing).await);
    assert!(h
        .connector
        .connections()
        .iter()
        .all(|c| c.is_released()));
}

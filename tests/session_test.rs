//! Session behaviour against the in-process memory transport

use region_probe::config::{Config, LogLevel};
use region_probe::error::{ConnectErrorKind, SessionError};
use region_probe::session::InspectionSession;
use region_probe::transport::MemoryConnector;
use std::time::Duration;

fn config(region: &str) -> Config {
    Config {
        host: "localhost".to_string(),
        port: 10334,
        region: region.to_string(),
        log_level: LogLevel::Info,
        dump_host: false,
        connect_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(1),
        fetch_workers: 1,
        auth_token: None,
        json_summary: false,
    }
}

#[tokio::test]
async fn test_reports_every_entry() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1"), ("k2", "v2")]);

    let summary = InspectionSession::new(connector.clone(), config("orders"))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.region, "orders");
    assert_eq!(summary.size_on_server, Some(2));
    assert_eq!(summary.keys_found, 2);
    assert_eq!(summary.reported, 2);
    assert!(summary.errors.is_empty());
    assert_eq!(connector.fetch_count(), 2);
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_region_not_found_still_closes_once() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1")]);

    let result = InspectionSession::new(connector.clone(), config("missing"))
        .run()
        .await;

    assert_eq!(
        result,
        Err(SessionError::RegionNotFound {
            region: "missing".to_string()
        })
    );
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(connector.close_count(), 1);
    assert_eq!(connector.fetch_count(), 0);
}

#[tokio::test]
async fn test_connect_failure_closes_nothing() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1")]);
    connector.fail_connect(ConnectErrorKind::Refused);

    let err = InspectionSession::new(connector.clone(), config("orders"))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    match err {
        SessionError::Connect(e) => {
            assert_eq!(e.kind, ConnectErrorKind::Refused);
            assert_eq!(e.target, "localhost:10334");
        }
        other => panic!("expected connect error, got {:?}", other),
    }
    assert_eq!(connector.close_count(), 0);
}

#[tokio::test]
async fn test_single_fetch_failure_does_not_abort() {
    let connector =
        MemoryConnector::new().with_region("letters", [("A", "1"), ("B", "2"), ("C", "3")]);
    connector.fail_fetch("B");

    let summary = InspectionSession::new(connector.clone(), config("letters"))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.keys_found, 3);
    assert_eq!(summary.reported, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].key, "B");
    assert_eq!(connector.fetch_count(), 3);
    assert_eq!(connector.close_count(), 1);
    assert_eq!(summary.exit_code(), 5);
}

#[tokio::test]
async fn test_pipelined_fetch_accounts_every_key() {
    let entries: Vec<(String, String)> = (0..50)
        .map(|i| (format!("key{:02}", i), format!("value{}", i)))
        .collect();
    let connector = MemoryConnector::new().with_region("bulk", entries);
    connector.fail_fetch("key07");
    connector.fail_fetch("key42");

    let mut cfg = config("bulk");
    cfg.fetch_workers = 4;

    let summary = InspectionSession::new(connector.clone(), cfg)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.keys_found, 50);
    assert_eq!(summary.reported, 48);
    let mut failed: Vec<_> = summary.errors.iter().map(|e| e.key.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["key07", "key42"]);
    assert_eq!(connector.fetch_count(), 50);
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_enumeration_failure_is_fatal_and_closes_once() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1"), ("k2", "v2")]);
    connector.fail_enumerate();

    let err = InspectionSession::new(connector.clone(), config("orders"))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Enumerate { ref region, .. } if region == "orders"));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(connector.close_count(), 1);
    assert_eq!(connector.fetch_count(), 0);
}

#[tokio::test]
async fn test_close_failure_keeps_summary() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1")]);
    connector.fail_close();

    let summary = InspectionSession::new(connector.clone(), config("orders"))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.reported, 1);
    assert!(summary.is_clean());
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_close_failure_does_not_mask_session_error() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1")]);
    connector.fail_close();

    let result = InspectionSession::new(connector.clone(), config("missing"))
        .run()
        .await;

    assert!(matches!(result, Err(SessionError::RegionNotFound { .. })));
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_empty_region() {
    let connector = MemoryConnector::new().with_region("empty", Vec::<(&str, &str)>::new());

    let summary = InspectionSession::new(connector.clone(), config("empty"))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.keys_found, 0);
    assert!(summary.is_clean());
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_host_dump_never_aborts_session() {
    let connector = MemoryConnector::new().with_region("orders", [("k1", "v1")]);
    let mut cfg = config("orders");
    cfg.dump_host = true;

    let summary = InspectionSession::new(connector.clone(), cfg)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.reported, 1);
    assert_eq!(connector.close_count(), 1);
}

//! CLI interface tests

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use predicates::prelude::*;
use region_probe::server::{RegionServer, ServerConfig};
use std::time::Duration;

fn probe() -> Command {
    let mut cmd = Command::cargo_bin("region-probe").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn find_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_help_flag() {
    probe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--locator"))
        .stdout(predicate::str::contains("--dump-host"));
}

#[test]
fn test_help_ignores_malformed_flags() {
    probe()
        .args(["--help", "-p", "notanumber"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("Connecting").not());
}

#[test]
fn test_version_flag() {
    probe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("region-probe"));
}

#[test]
fn test_invalid_port() {
    probe()
        .args(["-l", "localhost", "-p", "99999999", "-r", "orders"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid port '99999999'"))
        .stdout(predicate::str::contains("Connecting").not());
}

#[test]
fn test_missing_region() {
    probe()
        .args(["-l", "localhost", "-p", "10334"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--region"))
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_invalid_log_level() {
    probe()
        .args(["-l", "localhost", "-p", "10334", "-r", "orders", "--log-level", "loud"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid log level 'loud'"));
}

#[test]
fn test_connection_refused_exits_nonzero() {
    let port = find_available_port();
    probe()
        .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-r", "orders"])
        .args(["--connect-timeout", "5"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("cannot connect"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_against_fixture_server() {
    let server = RegionServer::new(&ServerConfig::default());
    server.put("orders", "k1", "v1");
    server.put("orders", "k2", "v2");

    let port = find_available_port();
    let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let service = server.service();
    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(service)
            .serve(addr)
            .await
            .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let output = tokio::task::spawn_blocking(move || {
        probe()
            .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-r", "orders", "--json"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .success()
        .stdout(predicate::str::contains("Connecting to 127.0.0.1"))
        .stdout(predicate::str::contains("Found 2 keys in region orders"))
        .stdout(predicate::str::contains("k1 = v1"))
        .stdout(predicate::str::contains("k2 = v2"))
        .stdout(predicate::str::contains("closed"))
        .stdout(predicate::str::contains("\"keys_found\": 2"));

    assert_eq!(server.session_count(), 0);
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_region_exits_nonzero() {
    let server = RegionServer::new(&ServerConfig::default());
    server.put("orders", "k1", "v1");

    let port = find_available_port();
    let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let service = server.service();
    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(service)
            .serve(addr)
            .await
            .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let output = tokio::task::spawn_blocking(move || {
        probe()
            .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-r", "customers"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("region 'customers' not found"))
        .stdout(predicate::str::contains("closed"));

    assert_eq!(server.session_count(), 0);
    handle.abort();
}

#[test]
fn test_excessive_fetch_workers_rejected() {
    probe()
        .args(["-l", "127.0.0.1", "-p", "1", "-r", "orders"])
        .args(["--fetch-workers", "20000", "--connect-timeout", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid fetch worker count '20000'"))
        .stdout(predicate::str::contains("Connecting").not());
}

#[test]
fn test_max_fetch_workers_reaches_connect() {
    let port = find_available_port();
    probe()
        .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-r", "orders"])
        .args(["--fetch-workers", "64", "--connect-timeout", "5"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("cannot connect"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unfetchable_key_exits_with_fetch_error_code() {
    let server = RegionServer::new(&ServerConfig::default());
    server.put("orders", "small", "v1");
    // Larger than the client's default 4 MiB decoding limit
    server.put("orders", "huge", vec![b'x'; 5 * 1024 * 1024]);

    let port = find_available_port();
    let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let service = server.service();
    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(service)
            .serve(addr)
            .await
            .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let output = tokio::task::spawn_blocking(move || {
        probe()
            .args(["-l", "127.0.0.1", "-p", &port.to_string(), "-r", "orders", "--json"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .failure()
        .code(5)
        .stdout(predicate::str::contains("Found 2 keys in region orders"))
        .stdout(predicate::str::contains("small = v1"))
        .stdout(predicate::str::contains("huge could not be fetched"))
        .stdout(predicate::str::contains("1 of 2 keys in region orders could not be fetched"))
        .stdout(predicate::str::contains("\"reported\": 1"))
        .stdout(predicate::str::contains("closed"));

    assert_eq!(server.session_count(), 0);
    handle.abort();
}

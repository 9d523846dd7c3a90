//! CLI integration tests
//!
//! Tests the wa-relay CLI using assert_cmd.

use std::net::TcpStream;
use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

/// Each test that talks to a gateway gets its own port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(0);

fn get_test_port() -> u16 {
    39700 + PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

fn wa_relay() -> Command {
    Command::cargo_bin("wa-relay")
        .expect("Failed to locate wa-relay binary - ensure it's built before running tests")
}

/// A foreground gateway process, killed on drop
struct GatewayProcess {
    child: Child,
    port: u16,
}

impl GatewayProcess {
    fn start(dir: &std::path::Path) -> Self {
        let port = get_test_port();
        let child = std::process::Command::new(assert_cmd::cargo::cargo_bin("wa-relay"))
            .args(["serve", "--foreground", "--ephemeral", "--port"])
            .arg(port.to_string())
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn gateway");

        for _ in 0..50 {
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                return Self { child, port };
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        panic!("Gateway did not start listening on port {}", port);
    }

    fn cli(&self) -> Command {
        let mut cmd = wa_relay();
        cmd.arg("--port").arg(self.port.to_string());
        cmd
    }
}

impl Drop for GatewayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_cli_help() {
    wa_relay()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("wa-relay"))
        .stdout(predicate::str::contains(
            "Multi-tenant messaging session gateway",
        ));
}

#[test]
fn test_cli_version() {
    wa_relay()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wa-relay"));
}

#[test]
fn test_cli_serve_help() {
    wa_relay()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gateway"));
}

#[test]
fn test_cli_activate_help() {
    wa_relay()
        .args(["activate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--watch"));
}

#[test]
fn test_cli_unknown_command() {
    wa_relay()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_activate_requires_phone() {
    wa_relay().arg("activate").assert().failure();
}

#[test]
fn test_cli_rejects_invalid_phone() {
    // Validation happens before any connection attempt
    wa_relay()
        .args(["--port", "1", "activate", "not-a-phone"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid phone number"));
}

#[test]
fn test_cli_list_without_gateway() {
    let port = get_test_port();
    wa_relay()
        .args(["--port", &port.to_string(), "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Is the gateway running"));
}

#[test]
fn test_cli_stop_without_gateway() {
    let port = get_test_port();
    wa_relay()
        .args(["--port", &port.to_string(), "stop"])
        .assert()
        .success()
        .stderr(predicate::str::contains("not running"));
}

#[test]
fn test_cli_tenant_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = GatewayProcess::start(dir.path());

    gateway
        .cli()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tenant sessions"));

    gateway
        .cli()
        .args(["activate", "+628111"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pairing started"));

    // The first pairing code is rendered straight away
    let mut rendered = false;
    for _ in 0..50 {
        let public = dir.path().join("public");
        if std::fs::read_dir(&public)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
        {
            rendered = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(rendered, "no pairing code image was written");

    gateway
        .cli()
        .args(["status", "628111"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active: yes"))
        .stdout(predicate::str::contains("Authenticated: no"));

    gateway
        .cli()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("628111"))
        .stdout(predicate::str::contains("pairing"));

    gateway
        .cli()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tenant Sessions: 1"));

    gateway
        .cli()
        .args(["deactivate", "628111"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deactivated 628111"));

    gateway
        .cli()
        .args(["deactivate", "628999"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No session for 628999"));

    gateway
        .cli()
        .args(["status", "628111"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active: no"));

    gateway
        .cli()
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("Gateway stopped"));
}

#[test]
fn test_cli_activate_paired_tenant() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("session")).unwrap();
    std::fs::write(dir.path().join("session/device-628222.json"), b"{}").unwrap();
    let gateway = GatewayProcess::start(dir.path());

    gateway
        .cli()
        .args(["activate", "628222", "--watch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("628222 connected"));

    gateway
        .cli()
        .args(["status", "628222"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Authenticated: yes"));

    gateway
        .cli()
        .args(["forget", "628222"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Forgot 628222"));
    assert!(!dir.path().join("session/device-628222.json").exists());
}

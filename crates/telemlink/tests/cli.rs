#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "telemlink-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_udp_port() -> u16 {
    let spare = UdpSocket::bind("127.0.0.1:0").expect("spare socket should bind");
    spare.local_addr().expect("spare socket should have an address").port()
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return Some(status);
        }
        if start.elapsed() >= timeout {
            return None;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn schema_materializes_template_and_prints_layout() {
    let dir = unique_temp_dir("schema");
    let schema_path = dir.join("struct_cfg.yaml");

    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("--format")
        .arg("json")
        .arg("schema")
        .arg("--schema")
        .arg(&schema_path)
        .output()
        .expect("schema should run");

    assert!(output.status.success());
    assert!(schema_path.exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"byte_size\":24"));
    assert!(stdout.contains("accel_data"));
    assert!(stdout.contains("\"type\":\"float\""));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn schema_without_template_fails_when_missing() {
    let dir = unique_temp_dir("no-template");
    let schema_path = dir.join("missing.yaml");

    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("schema")
        .arg("--schema")
        .arg(&schema_path)
        .arg("--no-template")
        .output()
        .expect("schema should run");

    assert_eq!(output.status.code(), Some(3));
    assert!(!schema_path.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_field_type_returns_60() {
    let dir = unique_temp_dir("bad-type");
    let schema_path = dir.join("bad.yaml");
    std::fs::write(&schema_path, "- accel:\n    a_x: quaternion\n").expect("schema should write");

    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("schema")
        .arg("--schema")
        .arg(&schema_path)
        .output()
        .expect("schema should run");

    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("quaternion"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_receives_frames_from_simulator() {
    let dir = unique_temp_dir("loopback");
    let schema_path = dir.join("struct_cfg.yaml");
    let addr = format!("127.0.0.1:{}", free_udp_port());

    let mut simulator = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("--format")
        .arg("json")
        .arg("simulate")
        .arg("--schema")
        .arg(&schema_path)
        .arg("--bind")
        .arg(&addr)
        .arg("--rate")
        .arg("200")
        .arg("--once")
        .arg("--wait-timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("simulate should start");

    let stderr = simulator.stderr.take().expect("stderr should be piped");
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            if line.contains("waiting for first datagram") {
                let _ = ready_tx.send(());
            }
        }
    });
    ready_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("simulator should start waiting");

    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg("--schema")
        .arg(&schema_path)
        .arg("--udp")
        .arg(&addr)
        .arg("--count")
        .arg("5")
        .arg("--duration")
        .arg("10s")
        .arg("--read-timeout")
        .arg("100ms")
        .output()
        .expect("listen should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(records.len(), 5);
    for record in &records {
        assert!(record["timestamp"].is_number());
        let values = record["values"].as_array().expect("values should be an array");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_array().map(Vec::len), Some(3));
    }

    let status = wait_with_timeout(&mut simulator, Duration::from_secs(5));
    if status.is_none() {
        let _ = simulator.kill();
        let _ = simulator.wait();
        panic!("simulator should exit after STOP");
    }
    assert!(status.is_some_and(|status| status.success()));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn simulate_without_receiver_returns_124() {
    let dir = unique_temp_dir("sim-timeout");
    let schema_path = dir.join("struct_cfg.yaml");

    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("--log-level")
        .arg("error")
        .arg("simulate")
        .arg("--schema")
        .arg(&schema_path)
        .arg("--bind")
        .arg("127.0.0.1:0")
        .arg("--wait-timeout")
        .arg("200ms")
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(124));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_rejects_zero_count() {
    let dir = unique_temp_dir("zero-count");
    let schema_path = dir.join("struct_cfg.yaml");

    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("listen")
        .arg("--schema")
        .arg(&schema_path)
        .arg("--udp")
        .arg("127.0.0.1:9")
        .arg("--count")
        .arg("0")
        .output()
        .expect("listen should run");

    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_telemlink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

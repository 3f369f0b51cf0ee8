//! CLI Integration Tests
//!
//! Runs the `shardcast` binary. Topology fixtures are written to temp files.
//! Node addresses always use `127.0.0.1` with an explicit port.

use serde_json::Value;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Output};
use std::thread::sleep;
use std::time::Duration;

fn shardcast() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shardcast"))
}

fn write_topology(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn broadcast(topology: &tempfile::NamedTempFile, extra: &[&str]) -> Output {
    shardcast()
        .arg("broadcast")
        .arg("-t")
        .arg(topology.path())
        .args(extra)
        .output()
        .unwrap()
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

/// Kills the node process when dropped.
struct NodeProcess(Child);

impl Drop for NodeProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn start_node(id: &str, port: u16, shards: &[&str]) -> NodeProcess {
    let mut cmd = shardcast();
    cmd.args(["node", "--id", id, "-b", &format!("127.0.0.1:{}", port)]);
    for shard in shards {
        cmd.args(["--shard", shard]);
    }
    let node = NodeProcess(cmd.spawn().unwrap());

    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return node;
        }
        sleep(Duration::from_millis(50));
    }
    panic!("node {} did not start listening on port {}", id, port);
}

#[test]
fn test_help() {
    let output = shardcast().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("node"));
    assert!(stdout.contains("broadcast"));
}

#[test]
fn test_broadcast_with_only_unassigned_shards() {
    let topology = write_topology(
        r#"{"version": 1, "shards": [{"dataset": "logs", "id": 0}, {"dataset": "logs", "id": 1}]}"#,
    );

    let output = broadcast(&topology, &["-d", "logs"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["total_shards"], 2);
    assert_eq!(result["successful_shards"], 0);
    assert_eq!(result["failed_shards"], 2);
    assert_eq!(result["total_docs"], 0);
    assert!(result["shard_failures"][0]["reason"]
        .as_str()
        .unwrap()
        .contains("no shards available"));
}

#[test]
fn test_blocked_dataset_fails() {
    let topology = write_topology(r#"{"shards": [{"dataset": "logs", "id": 0}]}"#);

    let output = broadcast(&topology, &["-d", "logs", "--block", "logs"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("blocked by: [4/dataset closed];"));
}

#[test]
fn test_unknown_dataset_fails() {
    let topology = write_topology(r#"{"shards": [{"dataset": "logs", "id": 0}]}"#);

    let output = broadcast(&topology, &["-d", "metrics"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no such dataset [metrics]"));
}

#[test]
fn test_invalid_topology_fails() {
    let topology = write_topology(r#"{"nodes": {"node_0": "127.0.0.1:9200"}}"#);

    let output = broadcast(&topology, &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("must start with http://"));
}

#[test]
fn test_https_topology_fails() {
    let topology = write_topology(r#"{"nodes": {"node_0": "https://127.0.0.1:9200"}}"#);

    let output = broadcast(&topology, &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("https://, which is not supported"));
}

#[test]
fn test_block_applies_when_no_dataset_named() {
    let topology = write_topology(
        r#"{"shards": [{"dataset": "logs", "id": 0}, {"dataset": "metrics", "id": 0}]}"#,
    );

    let output = broadcast(&topology, &["--block", "metrics"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("blocked by: [4/dataset closed];"));
}

#[test]
fn test_node_rejects_bad_shard_argument() {
    let output = shardcast()
        .args(["node", "--id", "node_0", "-b", "127.0.0.1:0", "--shard", "logs"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("expected dataset:id[:docs]"));
}

#[test]
fn test_broadcast_against_running_nodes() {
    let port_0 = free_port();
    let port_1 = free_port();
    let _node_0 = start_node("node_0", port_0, &["logs:0:100", "logs:1:20"]);
    let _node_1 = start_node("node_1", port_1, &["logs:2:3"]);

    let topology = write_topology(&format!(
        r#"{{
            "version": 2,
            "nodes": {{
                "node_0": "http://127.0.0.1:{}",
                "node_1": "http://127.0.0.1:{}"
            }},
            "shards": [
                {{"dataset": "logs", "id": 0, "node": "node_0"}},
                {{"dataset": "logs", "id": 1, "node": "node_0"}},
                {{"dataset": "logs", "id": 2, "node": "node_1"}},
                {{"dataset": "logs", "id": 3, "node": "node_1"}}
            ]
        }}"#,
        port_0, port_1
    ));

    let output = broadcast(&topology, &["--timeout-ms", "5000", "--metrics"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["total_shards"], 4);
    assert_eq!(result["successful_shards"], 3);
    assert_eq!(result["failed_shards"], 1);
    assert_eq!(result["total_docs"], 123);
    assert_eq!(result["shards"][0]["docs"], 100);
    assert!(result["shard_failures"][0]["cause"]
        .as_str()
        .unwrap()
        .contains("not held by this node"));

    let snapshot: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(snapshot["runs"], 1);
}

#![allow(dead_code)]

pub use assert_cmd::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Definitions export with one queue per plan status, plus a mirroring policy.
pub const DEFINITIONS: &str = r#"{
  "rabbit_version": "3.13.1",
  "queues": [
    {"name": "orders", "vhost": "/", "durable": true, "auto_delete": false,
     "arguments": {}},
    {"name": "priority-jobs", "vhost": "/", "durable": true, "auto_delete": false,
     "arguments": {"x-max-priority": 10}},
    {"name": "scratch", "vhost": "/", "durable": false, "auto_delete": true,
     "arguments": {}},
    {"name": "events", "vhost": "/", "durable": true, "auto_delete": false,
     "arguments": {"x-queue-type": "quorum"}},
    {"name": "invoices", "vhost": "billing", "durable": true, "auto_delete": false,
     "arguments": {}}
  ],
  "policies": [
    {"vhost": "billing", "name": "ha-billing", "pattern": "^inv", "apply-to": "queues",
     "definition": {"ha-mode": "all"}, "priority": 1}
  ]
}"#;

/// The `qhop` binary pointed at a broker nobody listens on, so a command
/// that reaches for the network fails fast instead of touching a real one.
pub fn qhop() -> Command {
    let mut cmd = Command::cargo_bin("qhop").expect("binary exists");
    cmd.env("QHOP_MANAGEMENT_URL", "http://127.0.0.1:9")
        .env("QHOP_AMQP_URL", "amqp://127.0.0.1:9")
        .env("RUST_LOG", "warn");
    cmd
}

pub fn write_definitions(dir: &Path) -> PathBuf {
    let path = dir.join("definitions.json");
    std::fs::write(&path, DEFINITIONS).expect("write definitions");
    path
}

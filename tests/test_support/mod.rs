#![allow(dead_code)]

use serde_json::json;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// A running gradecalcd with its pipes. Event lines (`{"event": ...}`) are
/// buffered separately from responses.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    events: VecDeque<serde_json::Value>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_env(env: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_gradecalcd");
        let mut cmd = Command::new(exe);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env_remove("GRADECALCD_WORKSPACE");
        for (k, v) in env {
            cmd.env(k, v);
        }
        let mut child = cmd.spawn().expect("spawn gradecalcd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            events: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Spawns a sidecar on a fresh temp workspace.
    pub fn with_workspace(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let mut s = Self::spawn();
        s.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        s
    }

    fn read_value(&mut self) -> serde_json::Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read line");
        assert!(!line.trim().is_empty(), "sidecar closed stdout");
        serde_json::from_str(line.trim()).expect("parse json line")
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write raw");
        self.stdin.flush().expect("flush raw");
        self.read_value()
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        loop {
            let value = self.read_value();
            if value.get("event").is_some() {
                self.events.push_back(value);
                continue;
            }
            assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
            return value;
        }
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Sends a request that must fail and returns its error code.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"]
            .as_str()
            .expect("error code")
            .to_string()
    }

    /// Events received so far, oldest first. Clears the buffer.
    pub fn take_events(&mut self) -> Vec<serde_json::Value> {
        self.events.drain(..).collect()
    }

    pub fn teacher_session(&mut self) -> serde_json::Value {
        self.ok(
            "auth.teacher.signup",
            json!({ "username": "Anita Rao", "password": "teach123" }),
        )
    }

    pub fn add_student(
        &mut self,
        id: &str,
        branch: &str,
        section: &str,
        marks: serde_json::Value,
    ) -> serde_json::Value {
        self.ok(
            "students.create",
            json!({
                "id": id,
                "name": format!("Student {}", id),
                "branch": branch,
                "section": section,
                "year": "2nd",
                "marks": marks,
            }),
        )
    }

    /// The class used across the IPC tests:
    /// S1 CSE-A 9.35 A, S2 CSE-A 3.50 F, S3 IT-A 8.50 B, S4 CSE-B 3.85 F,
    /// S5 IT-B 7.00 C.
    pub fn seed_class(&mut self) {
        self.add_student("S1", "CSE", "A", json!([95, 92]));
        self.add_student("S2", "CSE", "A", json!([30, 40]));
        self.add_student("S3", "IT", "A", json!([80, 90]));
        self.add_student("S4", "CSE", "B", json!([39, 38]));
        self.add_student("S5", "IT", "B", json!([70, 70]));
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn ids(list: &serde_json::Value) -> Vec<String> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|v| v["id"].as_str().expect("id").to_string())
        .collect()
}

pub fn ranks(list: &serde_json::Value) -> Vec<u64> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|v| v["rank"].as_u64().expect("rank"))
        .collect()
}

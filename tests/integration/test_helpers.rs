//! Fake agent executables for integration tests.
//!
//! Each [`FakeAgent`] is a `/bin/sh` script in its own temp directory. The
//! script records its argv, stdin, and environment next to itself, then runs
//! the supplied body, which normally prints canned JSON Lines events.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use serde_json::Value;
use tempfile::TempDir;

use adom_sdk::{Adom, ClientConfig};

pub struct FakeAgent {
    dir: TempDir,
    path: PathBuf,
}

impl FakeAgent {
    /// Write a script that records its invocation and then runs `body`.
    pub fn new(body: &str) -> Self {
        Self::install(|record| {
            format!(
                "#!/bin/sh\n\
                 printf '%s\\n' \"$@\" > '{record}/args.txt'\n\
                 env > '{record}/env.txt'\n\
                 cat > '{record}/stdin.txt'\n\
                 {body}\n"
            )
        })
    }

    /// A script that records its argv but never reads stdin, then runs `body`.
    pub fn ignoring_stdin(body: &str) -> Self {
        Self::install(|record| {
            format!(
                "#!/bin/sh\n\
                 printf '%s\\n' \"$@\" > '{record}/args.txt'\n\
                 {body}\n"
            )
        })
    }

    fn install(script: impl FnOnce(&str) -> String) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("adom");
        let record = dir.path().display().to_string();

        let staging = dir.path().join("adom.tmp");
        fs::write(&staging, script(&record)).expect("write script");
        fs::set_permissions(&staging, fs::Permissions::from_mode(0o755)).expect("chmod");
        fs::rename(&staging, &path).expect("install script");

        Self { dir, path }
    }

    /// A script that prints `events` as JSON Lines and exits 0.
    pub fn emitting(events: &[Value]) -> Self {
        Self::new(&emit(events))
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::default().with_executable_path(&self.path)
    }

    pub fn client(&self) -> Adom {
        Adom::new(self.config()).expect("client")
    }

    /// Whether the script was ever started.
    pub fn ran(&self) -> bool {
        self.dir.path().join("args.txt").exists()
    }

    /// Arguments of the most recent invocation.
    pub fn args(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("args.txt"))
            .expect("args recorded")
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Turn request of the most recent invocation, parsed as JSON.
    pub fn request(&self) -> Value {
        let raw = fs::read_to_string(self.dir.path().join("stdin.txt")).expect("stdin recorded");
        assert_eq!(raw.lines().count(), 1, "request must be exactly one line: {raw:?}");
        serde_json::from_str(raw.trim_end()).expect("request is json")
    }

    /// Value of `key` in the most recent invocation's environment.
    pub fn env_var(&self, key: &str) -> Option<String> {
        let raw = fs::read_to_string(self.dir.path().join("env.txt")).expect("env recorded");
        let prefix = format!("{key}=");
        raw.lines()
            .find_map(|line| line.strip_prefix(&prefix).map(str::to_owned))
    }
}

/// Shell snippet printing `events` as JSON Lines.
pub fn emit(events: &[Value]) -> String {
    let mut body = String::from("cat <<'JSONL'\n");
    for event in events {
        body.push_str(&event.to_string());
        body.push('\n');
    }
    body.push_str("JSONL");
    body
}

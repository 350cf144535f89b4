//! Unit tests for `ClientConfig` TOML parsing and validation.

use std::io::Write;

use adom_sdk::{ClientConfig, SandboxMode, SdkError};

const SAMPLE: &str = r#"
executable_path = "/opt/adom/bin/adom"
base_url = "https://proxy.internal/v1"
api_key = "sk-test"

[env]
HTTPS_PROXY = "http://proxy.internal:3128"

[thread]
model = "adom-mini"
sandbox_mode = "workspace-write"
skip_git_repo_check = true
"#;

#[test]
fn full_config_parses() {
    let config = ClientConfig::from_toml_str(SAMPLE).expect("config must parse");

    assert_eq!(
        config.executable_path.as_deref(),
        Some(std::path::Path::new("/opt/adom/bin/adom"))
    );
    assert_eq!(config.base_url.as_deref(), Some("https://proxy.internal/v1"));
    assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    assert_eq!(
        config.env.get("HTTPS_PROXY").map(String::as_str),
        Some("http://proxy.internal:3128")
    );
    assert_eq!(config.thread.model.as_deref(), Some("adom-mini"));
    assert_eq!(config.thread.sandbox_mode, Some(SandboxMode::WorkspaceWrite));
    assert!(config.thread.skip_git_repo_check);
}

#[test]
fn empty_config_uses_defaults() {
    let config = ClientConfig::from_toml_str("").expect("empty config must parse");

    assert_eq!(config, ClientConfig::default());
}

#[test]
fn unknown_key_is_rejected() {
    let err = ClientConfig::from_toml_str("executable = \"adom\"").expect_err("must fail");

    assert!(matches!(err, SdkError::Config(_)), "unexpected error: {err}");
}

#[test]
fn unknown_thread_key_is_rejected() {
    let err = ClientConfig::from_toml_str("[thread]\nsandbox = \"read-only\"")
        .expect_err("must fail");

    assert!(matches!(err, SdkError::Config(_)), "unexpected error: {err}");
}

#[test]
fn empty_executable_path_is_rejected() {
    let err = ClientConfig::from_toml_str("executable_path = \"\"").expect_err("must fail");

    assert!(
        err.to_string().contains("executable_path"),
        "unexpected error: {err}"
    );
}

#[test]
fn env_key_with_equals_sign_is_rejected() {
    let config = ClientConfig::default().with_env("A=B", "c");

    assert!(matches!(config.validate(), Err(SdkError::Config(_))));
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SAMPLE.as_bytes()).expect("write config");

    let config = ClientConfig::load_from_path(file.path()).expect("load");

    assert_eq!(config.api_key.as_deref(), Some("sk-test"));
}

#[test]
fn load_from_missing_path_is_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");

    let err = ClientConfig::load_from_path(dir.path().join("missing.toml"))
        .expect_err("must fail");

    assert!(
        matches!(&err, SdkError::Config(msg) if msg.contains("failed to read config")),
        "unexpected error: {err}"
    );
}

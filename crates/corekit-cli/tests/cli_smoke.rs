use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

/// Scratch directory for config files, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new(label: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let dir = std::env::temp_dir().join(format!(
            "corekit-{label}-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("scratch dir should be created");
        Self(dir)
    }

    fn config(&self, toml: &str) -> PathBuf {
        let path = self.0.join("corekit.toml");
        fs::write(&path, toml).expect("config should be written");
        path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn corekit(args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Output {
    Command::new(env!("CARGO_BIN_EXE_corekit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("corekit should run")
}

/// Stdout of a run that must exit with `code`.
fn stdout_of(output: &Output, code: i32) -> String {
    assert_eq!(
        output.status.code(),
        Some(code),
        "unexpected exit status\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json_of(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{stdout}"))
}

#[test]
fn checks_json_lists_builtins() {
    let rows = json_of(&stdout_of(&corekit(["checks", "--json"]), 0));
    let rows = rows.as_array().expect("rows should be an array");
    let string = rows
        .iter()
        .find(|row| row["name"] == "isString")
        .expect("isString should be listed");
    assert_eq!(string["kind"], "simple");
    assert_eq!(string["describePriority"], 50);
    assert!(rows.iter().any(|row| row["name"] == "isInstanceOf" && row["kind"] == "extended"));
}

#[test]
fn validate_passes_with_exit_zero() {
    let output = corekit(["validate", "--value", "\"hello\"", "--instruction", "isString"]);
    insta::assert_snapshot!(stdout_of(&output, 0).trim_end(), @"valid: isString");
}

#[test]
fn validate_failure_exits_one_and_describes_the_value() {
    let output = corekit([
        "validate",
        "--value",
        "[1, 2, 3]",
        "--instruction",
        r#"{"$any": ["isNull", "isString"]}"#,
        "--json",
    ]);
    insta::assert_json_snapshot!(json_of(&stdout_of(&output, 1)), @r#"
    {
      "actual": "Array (length=3)",
      "failures": [
        {
          "check": "isNull"
        },
        {
          "check": "isString"
        }
      ],
      "success": false
    }
    "#);
}

#[test]
fn unknown_checks_are_usage_errors() {
    let output = corekit(["validate", "--value", "1", "--instruction", "isBogus"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("isBogus"));
}

#[test]
fn describe_uses_the_configured_preview() {
    let scratch = Scratch::new("describe");
    let config = scratch.config("[validation]\npreview_chars = 4\n");

    let output = corekit([
        OsStr::new("describe"),
        OsStr::new("--value"),
        OsStr::new("\"abcdefgh\""),
        OsStr::new("--config"),
        config.as_os_str(),
    ]);
    insta::assert_snapshot!(stdout_of(&output, 0).trim_end(), @r#"String ("abcd"…, length=8)"#);

    let output = corekit(["describe", "--value", "null", "--json"]);
    insta::assert_json_snapshot!(json_of(&stdout_of(&output, 0)), @r#"
    {
      "check": "isNull",
      "description": "Null"
    }
    "#);
}

#[test]
fn config_prints_defaults_and_file_overrides() {
    let defaults = json_of(&stdout_of(&corekit(["config", "--json"]), 0));
    assert_eq!(defaults["loader"]["composition_cache"], true);
    assert_eq!(defaults["validation"]["preview_chars"], 32);

    let scratch = Scratch::new("config");
    let config = scratch.config("[loader]\ncomposition_cache = false\n\n[ioc]\napp_name = \"demo\"\n");
    let output = corekit([
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("config"),
        OsStr::new("--json"),
    ]);
    let loaded = json_of(&stdout_of(&output, 0));
    assert_eq!(loaded["loader"]["composition_cache"], false);
    assert_eq!(loaded["ioc"]["app_name"], "demo");
}

#[test]
fn unreadable_config_is_a_usage_error() {
    let output = corekit(["--config", "/nonexistent/corekit.toml", "checks"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/corekit.toml"));
}

#[test]
fn empty_combinators_are_usage_errors() {
    let output = corekit(["validate", "--value", "1", "--instruction", r#"{"$all": []}"#]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("$all"));
}

// CLI integration tests for reframe/check flows.
use std::io::{Seek, SeekFrom, Write};
use std::process::{Command, Output, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_scheme-codec");
    Command::new(exe)
}

fn run_with_stdin(args: &[&str], input: &str) -> Output {
    let mut file = tempfile::tempfile().expect("tempfile");
    file.write_all(input.as_bytes()).expect("write input");
    file.seek(SeekFrom::Start(0)).expect("rewind");
    cmd()
        .args(args)
        .stdin(Stdio::from(file))
        .output()
        .expect("run scheme-codec")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    serde_json::from_str(line).expect("valid json")
}

#[test]
fn reframe_yaml_to_compact_json() {
    let input = "kind: Simple\napiVersion: foogroup/v1alpha1\n---\n# skipped\n---\nb: [1, 2]\n";
    let output = run_with_stdin(&["reframe", "--from", "yaml", "--to", "json", "--compact"], input);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "{\"kind\":\"Simple\",\"apiVersion\":\"foogroup/v1alpha1\"}\n{\"b\":[1,2]}\n"
    );
}

#[test]
fn reframe_json_to_yaml_sorts_keys_and_separates_documents() {
    let input = "{\"kind\":\"Simple\",\"apiVersion\":\"v1\"}\n{\"a\":1}";
    let output = run_with_stdin(&["reframe", "--from", "json", "--to", "yaml"], input);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "apiVersion: v1\nkind: Simple\n---\na: 1\n"
    );
}

#[test]
fn check_counts_documents() {
    let output = run_with_stdin(&["check", "--in", "yaml"], "a: 1\n---\nb: 2\n---\n");
    assert!(output.status.success());
    let summary = parse_json_line(&output.stdout);
    assert_eq!(summary["documents"], 2);
}

#[test]
fn strict_check_rejects_duplicate_keys() {
    let input = "{\"a\":1}\n{\"a\":1,\"a\":2}\n";
    let output = run_with_stdin(&["check", "--in", "json", "--strict"], input);
    assert_eq!(output.status.code(), Some(5));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "StrictDecoding");
    assert_eq!(err["error"]["index"], 1);

    let lenient = run_with_stdin(&["check", "--in", "json"], input);
    assert!(lenient.status.success());
}

#[test]
fn malformed_input_exits_with_malformed_code() {
    let output = run_with_stdin(&["check", "--in", "json"], "{\"a\":");
    assert_eq!(output.status.code(), Some(4));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Malformed");
}

#[test]
fn oversized_documents_are_rejected() {
    let output = run_with_stdin(
        &["--max-frame-bytes", "8", "check", "--in", "yaml"],
        "key: a-long-value\n",
    );
    assert_eq!(output.status.code(), Some(4));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "FrameTooLarge");
    assert!(err["error"]["hint"].is_string());
}

#[test]
fn unknown_format_is_a_usage_error() {
    let output = cmd()
        .args(["check", "--in", "toml"])
        .stdin(Stdio::null())
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}

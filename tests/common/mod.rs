// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::NamedTempFile;

/// Path of the binary cargo built for this test run
fn binary_path() -> &'static str {
    env!("CARGO_BIN_EXE_chunkmap")
}

fn split_output(output: Output) -> (String, String, i32) {
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run chunkmap with given arguments and input via stdin
pub fn run_chunkmap_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    run_chunkmap_with_bytes(args, input.as_bytes())
}

/// Run chunkmap feeding raw bytes (e.g. compressed data) on stdin
pub fn run_chunkmap_with_bytes(args: &[&str], input: &[u8]) -> (String, String, i32) {
    let mut cmd = Command::new(binary_path())
        .args(args)
        .env_remove("CHUNKMAP_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start chunkmap");

    if let Some(mut stdin) = cmd.stdin.take() {
        stdin.write_all(input).expect("Failed to write to stdin");
    }

    split_output(cmd.wait_with_output().expect("Failed to read output"))
}

/// Run chunkmap with a temporary file appended as the last argument
pub fn run_chunkmap_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(file_content.as_bytes())
        .expect("Failed to write to temp file");

    let mut full_args = args.to_vec();
    full_args.push(temp_file.path().to_str().unwrap());

    let output = Command::new(binary_path())
        .args(&full_args)
        .env_remove("CHUNKMAP_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute chunkmap");

    split_output(output)
}

/// Pull the "Items read: N" count out of the --stats summary
pub fn extract_items_read_from_stats(stderr: &str) -> usize {
    stderr
        .lines()
        .find_map(|line| line.strip_prefix("Items read:"))
        .and_then(|rest| rest.trim().split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

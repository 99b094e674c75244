mod common;
use common::*;
use flate2::write::GzEncoder;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_upper_preserves_input_order() {
    let input = "alpha\nbeta\ngamma\ndelta\nepsilon\n";
    let (stdout, stderr, exit_code) =
        run_chunkmap_with_input(&["--op", "upper", "--threads", "3", "--chunk-size", "1"], input);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(stdout, "ALPHA\nBETA\nGAMMA\nDELTA\nEPSILON\n");
}

#[test]
fn test_unordered_emits_every_line() {
    let input: String = (0..200).map(|i| format!("line{}\n", i)).collect();
    let (stdout, _stderr, exit_code) = run_chunkmap_with_input(
        &["--op", "reverse", "--threads", "4", "--chunk-size", "7", "--unordered"],
        &input,
    );
    assert_eq!(exit_code, 0);

    let mut got: Vec<&str> = stdout.lines().collect();
    let expected_owned: Vec<String> = (0..200)
        .map(|i| format!("line{}", i).chars().rev().collect())
        .collect();
    let mut expected: Vec<&str> = expected_owned.iter().map(String::as_str).collect();
    got.sort_unstable();
    expected.sort_unstable();
    assert_eq!(got, expected);
}

#[test]
fn test_json_fault_stops_with_exit_code_one() {
    let input = "{\"a\": 1}\n{broken\n{\"c\": 3}\n";
    let (stdout, stderr, exit_code) =
        run_chunkmap_with_input(&["--op", "json", "--chunk-size", "3"], input);

    assert_eq!(exit_code, 1);
    assert_eq!(stdout, "{\"a\":1}\n", "only the result before the fault is printed");
    assert!(stderr.contains("chunkmap: Error: worker failed on item 1"), "stderr: {}", stderr);
    assert!(stderr.contains("caused by: Json failed"), "stderr: {}", stderr);
}

#[test]
fn test_ignore_errors_prints_null_text() {
    let input = "{\"a\": 1}\n{broken\n{\"c\": 3}\n";
    let (stdout, stderr, exit_code) = run_chunkmap_with_input(
        &["--op", "json", "--ignore-errors", "--null-text", "<invalid>"],
        input,
    );

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(stdout, "{\"a\":1}\n<invalid>\n{\"c\":3}\n");
    assert!(stderr.contains("worker fault ignored"), "fault is logged: {}", stderr);
}

#[test]
fn test_invalid_utf8_line_is_skipped_with_ignore_errors() {
    let mut input = b"first\n".to_vec();
    input.extend_from_slice(&[0xFF, 0xFE, b'\n']);
    input.extend_from_slice(b"third\n");

    let (stdout, stderr, exit_code) =
        run_chunkmap_with_bytes(&["--op", "upper", "--ignore-errors"], &input);
    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(stdout, "FIRST\nTHIRD\n");
    assert!(stderr.contains("input fault ignored"));
}

#[test]
fn test_invalid_first_line_is_skipped_with_ignore_errors() {
    let (stdout, stderr, exit_code) =
        run_chunkmap_with_bytes(&["--op", "upper", "--ignore-errors"], b"\xff\xfe\nhello\n");
    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(stdout, "HELLO\n");
    assert_eq!(stderr.matches("input fault ignored").count(), 1);
}

#[test]
fn test_invalid_line_stops_when_config_says_stop() {
    let mut config = NamedTempFile::new().unwrap();
    config
        .write_all(br#"{"input_fault_policy": "stop", "ignore_errors": true}"#)
        .unwrap();

    let (stdout, _stderr, exit_code) = run_chunkmap_with_bytes(
        &["--op", "upper", "--config", config.path().to_str().unwrap()],
        b"first\n\xff\nthird\n",
    );
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "FIRST\n");
}

/// Gzip header followed by a deflate block of a reserved type
fn corrupt_gzip_file() -> NamedTempFile {
    let mut data = vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
    data.extend_from_slice(&[0xff; 64]);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file
}

#[test]
fn test_corrupt_gzip_is_reported_once_with_ignore_errors() {
    let file = corrupt_gzip_file();
    let (stdout, stderr, exit_code) = run_chunkmap_with_input(
        &["--op", "upper", "--ignore-errors", file.path().to_str().unwrap()],
        "",
    );
    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert!(stdout.is_empty());
    assert_eq!(stderr.matches("input fault ignored").count(), 1, "stderr: {}", stderr);
}

#[test]
fn test_corrupt_gzip_fails_without_ignore_errors() {
    let file = corrupt_gzip_file();
    let (_stdout, stderr, exit_code) =
        run_chunkmap_with_input(&["--op", "upper", file.path().to_str().unwrap()], "");
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("input source failed"), "stderr: {}", stderr);
    assert!(stderr.contains("failed to read input"), "stderr: {}", stderr);
}

#[cfg(unix)]
#[test]
fn test_sigterm_exits_with_143() {
    use std::process::{Command, Stdio};
    use std::thread;
    use std::time::Duration;

    let mut child = Command::new(env!("CARGO_BIN_EXE_chunkmap"))
        .args(["--op", "upper"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start chunkmap");

    // A first line gets startup past compression detection while stdin stays open
    let mut stdin = child.stdin.take().expect("piped stdin");
    stdin.write_all(b"hello\n").expect("write first line");
    stdin.flush().expect("flush stdin");
    thread::sleep(Duration::from_millis(300));
    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(status.success());

    // End of input lets the blocked read return
    drop(stdin);
    let exit = child.wait().expect("Failed to wait for chunkmap");
    assert_eq!(exit.code(), Some(143));
}

#[test]
fn test_gzip_file_is_decompressed() {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"abc\n").unwrap();
    let compressed = encoder.finish().unwrap();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&compressed).unwrap();

    let (stdout, _stderr, exit_code) = run_chunkmap_with_input(
        &["--op", "sha256", file.path().to_str().unwrap()],
        "",
    );
    assert_eq!(exit_code, 0);
    assert_eq!(
        stdout.trim(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_stats_reported_on_stderr() {
    let input = "one\ntwo\nthree\n";
    let (stdout, stderr, exit_code) =
        run_chunkmap_with_file(&["--op", "length", "--stats"], input);

    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "3\n3\n5\n");
    assert_eq!(extract_items_read_from_stats(&stderr), 3);
    assert!(stderr.contains("Elapsed:"));
}

#[test]
fn test_zero_threads_is_usage_error() {
    let (_stdout, stderr, exit_code) =
        run_chunkmap_with_input(&["--op", "trim", "--threads", "0"], "x\n");
    assert_eq!(exit_code, 2);
    assert!(stderr.contains("num_workers"), "stderr: {}", stderr);
}

#[test]
fn test_missing_file_is_reported() {
    let (_stdout, stderr, exit_code) =
        run_chunkmap_with_input(&["--op", "trim", "/nonexistent/chunkmap-input.txt"], "");
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("Failed to open"));
}

#[test]
fn test_config_file_supplies_defaults() {
    let mut config = NamedTempFile::new().unwrap();
    config
        .write_all(br#"{"ignore_errors": true, "num_workers": 2}"#)
        .unwrap();

    let (stdout, _stderr, exit_code) = run_chunkmap_with_input(
        &[
            "--op",
            "json",
            "--config",
            config.path().to_str().unwrap(),
        ],
        "nope\n[1, 2]\n",
    );
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "null\n[1,2]\n");
}

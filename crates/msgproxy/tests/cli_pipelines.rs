use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/msgproxy-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn msgproxy() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_msgproxy"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn length_framed_file_reframes_to_lines() {
    let dir = unique_temp_dir("length-to-lines");
    let input = dir.join("in.bin");
    let output = dir.join("out.txt");
    std::fs::write(&input, b"\x05\x00\x00\x00hello\x05\x00\x00\x00world").unwrap();

    let status = msgproxy()
        .arg(format!("file:{}", input.display()))
        .arg("-length")
        .arg("+lines")
        .arg(format!("file:{}", output.display()))
        .status()
        .expect("msgproxy should start");

    assert!(status.success());
    // The delimiter encoder joins between messages only: no trailing newline.
    assert_eq!(std::fs::read(&output).unwrap(), b"hello\nworld");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stdin_url_encodes_to_stdout() {
    let mut child = msgproxy()
        .arg("-")
        .arg("+url")
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("msgproxy should start");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"a b&c")
        .unwrap();

    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"a%20b%26c");
}

#[test]
fn folder_lines_reframe_to_length_framed_files() {
    let dir = unique_temp_dir("folder-reframe");
    let input = dir.join("in");
    let output = dir.join("out");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(input.join("messages.txt"), b"m1\nm2\nm3").unwrap();

    let status = msgproxy()
        .arg(format!("folder:{}", input.display()))
        .arg("-lines")
        .arg("+length")
        .arg(format!("folder:{}", output.display()))
        .status()
        .expect("msgproxy should start");

    assert!(status.success());
    assert_eq!(
        std::fs::read(output.join("000001.msg")).unwrap(),
        b"\x02\x00\x00\x00m1"
    );
    assert_eq!(
        std::fs::read(output.join("000002.msg")).unwrap(),
        b"\x02\x00\x00\x00m2"
    );
    assert_eq!(
        std::fs::read(output.join("000003.msg")).unwrap(),
        b"\x02\x00\x00\x00m3"
    );
    assert!(!output.join("000004.msg").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn partial_length_frame_is_dropped_at_end() {
    let dir = unique_temp_dir("partial-frame");
    let input = dir.join("in.bin");
    let output = dir.join("out.txt");
    // One whole message followed by half a header.
    std::fs::write(&input, b"\x02\x00\x00\x00ok\x05\x00").unwrap();

    let status = msgproxy()
        .arg(format!("file:{}", input.display()))
        .arg("-length")
        .arg(format!("file:{}", output.display()))
        .status()
        .expect("msgproxy should start");

    assert!(status.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"ok");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_stage_exits_with_usage_code() {
    let status = msgproxy()
        .arg("-")
        .arg("gzip")
        .arg("-")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("msgproxy should start");
    assert_eq!(status.code(), Some(64));
}

#[test]
fn missing_source_file_exits_with_usage_code() {
    let status = msgproxy()
        .arg("file:/nonexistent/msgproxy-input")
        .arg("-")
        .stderr(Stdio::null())
        .status()
        .expect("msgproxy should start");
    assert_eq!(status.code(), Some(64));
}

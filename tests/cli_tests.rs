use anyhow::{Result, bail};
use fifo_poll_probe::fifo;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

fn probe_command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fifo-poll-probe"));
    cmd.args(args).env_remove("FIFO_PROBE_LOG");
    cmd
}

fn run_probe(args: &[&str]) -> Result<String> {
    let output = probe_command(args).output()?;
    if !output.status.success() {
        bail!(
            "Failed to execute fifo-poll-probe with: {:?}\n{}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?)
}

fn run_probe_raw(args: &[&str]) -> Result<Output> {
    Ok(probe_command(args).output()?)
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[cfg(target_os = "linux")]
#[test]
fn passes_on_linux() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipe = dir.path().join("pipe");
    let stdout = run_probe(&["--path", path_arg(&pipe)])?;

    let lines = stdout.lines().collect::<Vec<_>>();
    let p = pipe.display();
    assert_eq!(lines.len(), 14, "{stdout}");
    assert!(lines[0].starts_with(&format!("0. open(r) = {p} -> ")));
    assert_eq!(lines[1], "0. poll    = <empty>");
    assert_eq!(lines[2], "0. read    = b''");
    assert!(lines[3].starts_with(&format!("1. open(w) = {p} -> ")));
    assert!(lines[4].starts_with("1. poll    = "));
    assert!(lines[4].contains("POLLIN(0x1)"));
    assert_eq!(lines[5], "1. read    = b'test 1'");
    assert!(lines[6].ends_with(": POLLHUP(0x10)"), "{}", lines[6]);
    assert_eq!(lines[7], "2. read    = b''");
    assert!(lines[9].contains("POLLIN(0x1)"));
    assert_eq!(lines[10], "3. read    = b'test 2'");
    assert!(lines[11].ends_with(": POLLHUP(0x10)"), "{}", lines[11]);
    assert_eq!(lines[12], "4. read    = b''");
    assert_eq!(lines[13], "PASS");

    // The FIFO is left behind for inspection.
    assert!(fifo::is_fifo(&pipe));
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn run_subcommand_and_blocking_writer() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipe = dir.path().join("nested").join("pipe");
    let stdout = run_probe(&[
        "run",
        "--path",
        path_arg(&pipe),
        "--blocking-writer",
        "--timeout-ms",
        "200",
        "--exit-code",
    ])?;
    assert!(stdout.ends_with("PASS\n"), "{stdout}");
    assert!(fifo::is_fifo(&pipe));
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn replaces_stale_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipe = dir.path().join("pipe");
    std::fs::write(&pipe, b"left over")?;
    let stdout = run_probe(&["--path", path_arg(&pipe), "--timeout-ms", "200"])?;
    assert!(stdout.ends_with("PASS\n"), "{stdout}");
    Ok(())
}

#[test]
fn fifo_creation_failure_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"")?;

    let output = run_probe_raw(&["--path", path_arg(&blocker.join("pipe"))])?;
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to create FIFO"), "{stderr}");
    Ok(())
}

#[test]
fn broken_stdout_exits_with_status_one() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipe = dir.path().join("pipe");
    let mut child = probe_command(&["--path", path_arg(&pipe)])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    // Close our end before the first step finishes polling.
    drop(child.stdout.take());

    let output = child.wait_with_output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn interrupt_exits_with_status_one() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipe = dir.path().join("pipe");
    let child = probe_command(&["--path", path_arg(&pipe), "--timeout-ms", "5000"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Step 0 is still polling an empty FIFO at this point.
    std::thread::sleep(Duration::from_millis(500));
    // SAFETY: plain `kill(2)` on a child we spawned and have not reaped.
    let ret = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) };
    assert_eq!(ret, 0);

    let output = child.wait_with_output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn flags_lists_poll_conditions() -> Result<()> {
    let stdout = run_probe(&["flags"])?;
    assert!(stdout.starts_with("Poll conditions:\n"));
    for name in ["POLLIN", "POLLPRI", "POLLHUP", "POLLERR", "POLLNVAL"] {
        assert!(stdout.contains(name), "missing {name}: {stdout}");
    }
    assert!(!stdout.contains("POLLRD"));
    Ok(())
}

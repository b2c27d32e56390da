//! The bounded-subprocess primitive shared by the sandbox launcher
//! (`runner.rs`) and plain argv-style CLI wrappers (external tool handlers
//! elsewhere in the workspace). Never builds a shell string — always
//! `Command::new(program).args(argv)`.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::warn;

use crate::error::{Result, RunnerError};

pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// Spawns `program` with `args`, optionally writing `stdin_input` then
/// closing the pipe, and reads stdout/stderr concurrently with a combined
/// byte cap. Exceeding `max_output_bytes` on either stream kills the child
/// (`SIGKILL` by pid) and returns `RunnerError::Oversize`. The whole
/// operation is raced against `timeout_secs`; expiry also kills the child
/// and returns `RunnerError::Timeout`.
pub async fn exec_bounded(
    program: &str,
    args: &[String],
    stdin_input: Option<&str>,
    timeout_secs: u64,
    max_output_bytes: usize,
) -> Result<ExecOutput> {
    let timeout = std::time::Duration::from_secs(timeout_secs);
    match tokio::time::timeout(
        timeout,
        spawn_and_drain(program, args, stdin_input, max_output_bytes),
    )
    .await
    {
        Ok(inner) => inner,
        Err(_) => Err(RunnerError::Timeout { secs: timeout_secs }),
    }
}

async fn spawn_and_drain(
    program: &str,
    args: &[String],
    stdin_input: Option<&str>,
    max_output_bytes: usize,
) -> Result<ExecOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RunnerError::Spawn(e.to_string()))?;

    let pid = child.id();

    if let Some(input) = stdin_input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }
    } else {
        drop(child.stdin.take());
    }

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");

    let (stdout_result, stderr_result) = tokio::join!(
        read_bounded(&mut stdout, max_output_bytes),
        read_bounded(&mut stderr, max_output_bytes),
    );

    let (stdout_bytes, stderr_bytes) = match (stdout_result, stderr_result) {
        (Some(out), Some(err)) => (out, err),
        _ => {
            kill_pid(pid);
            let _ = child.wait().await;
            return Err(RunnerError::Oversize {
                max: max_output_bytes,
            });
        }
    };

    let status = child.wait().await?;
    Ok(ExecOutput {
        stdout: stdout_bytes,
        stderr: stderr_bytes,
        exit_code: status.code().unwrap_or(-1),
    })
}

/// Reads `reader` to EOF, returning `None` (instead of the accumulated
/// bytes) the moment the total exceeds `max` — the caller kills the child
/// on `None`.
async fn read_bounded<R: AsyncRead + Unpin>(reader: &mut R, max: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => return Some(buf),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > max {
                    return None;
                }
            }
            Err(e) => {
                warn!(error = %e, "read error draining subprocess output");
                return Some(buf);
            }
        }
    }
}

fn kill_pid(pid: Option<u32>) {
    if let Some(raw_pid) = pid {
        #[cfg(unix)]
        unsafe {
            libc::kill(raw_pid as libc::pid_t, libc::SIGKILL);
        }
        #[cfg(not(unix))]
        {
            let _ = raw_pid;
        }
    }
}

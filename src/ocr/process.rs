//! Time-bounded invocation of external tools.

use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::error::{Error, Result};

/// Run `command` to completion, killing it after `timeout`.
///
/// A missing executable maps to [`Error::OcrUnavailable`], an expired
/// budget to [`Error::Timeout`]. The exit status is returned as-is.
pub fn run_bounded(mut command: Command, name: &str, timeout: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::OcrUnavailable(format!("{} not found", name)),
            _ => Error::OcrUnavailable(format!("{}: {}", name, e)),
        })?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let mut out = Vec::new();
        if let Some(pipe) = stdout.as_mut() {
            let _ = pipe.read_to_end(&mut out);
        }
        let _ = tx.send(out);
    });
    let errors = thread::spawn(move || {
        let mut err = Vec::new();
        if let Some(pipe) = stderr.as_mut() {
            let _ = pipe.read_to_end(&mut err);
        }
        err
    });

    match rx.recv_timeout(timeout) {
        Ok(stdout) => {
            let status = child.wait()?;
            let stderr = errors.join().unwrap_or_default();
            Ok(Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(RecvTimeoutError::Timeout) => {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("{} exceeded {}s, killed", name, timeout.as_secs());
            Err(Error::Timeout(name.to_string(), timeout.as_secs()))
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::Ocr(format!("{}: output reader failed", name)))
        }
    }
}

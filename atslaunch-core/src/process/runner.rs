//! Subprocess execution with live output forwarding.
//!
//! Each spawned process gets two reader tasks, one per output stream, that
//! forward complete lines to their sink while the caller waits for the exit
//! status. Both tasks are joined before the status is returned, so every line
//! has reached its sink by then.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{LaunchError, Result};

use super::sink::LineSink;

/// Runs external commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOrchestrator;

impl ProcessOrchestrator {
    /// Runs `command` (program followed by its arguments) in `working_dir`.
    ///
    /// `env` is applied over the inherited environment, its entries winning on
    /// collision. Returns the child's exit code, or `-1` when it was killed by
    /// a signal. A non-zero code is not an error here.
    pub async fn run<O, E>(
        &self,
        command: &[String],
        working_dir: &Path,
        env: &BTreeMap<String, String>,
        stdout_sink: Arc<O>,
        stderr_sink: Arc<E>,
    ) -> Result<i32>
    where
        O: LineSink,
        E: LineSink,
    {
        let (program, args) = command.split_first().ok_or_else(|| LaunchError::ProcessLaunch {
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        })?;

        debug!(
            program = %program,
            cwd = %working_dir.display(),
            "Spawning {}",
            command.join(" ")
        );

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(working_dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| LaunchError::ProcessLaunch {
            program: program.clone(),
            source: e,
        })?;

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| tokio::spawn(forward_lines(out, stdout_sink))),
            child
                .stderr
                .take()
                .map(|err| tokio::spawn(forward_lines(err, stderr_sink))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let status = child
            .wait()
            .await
            .map_err(|e| LaunchError::io(format!("Failed to wait for {}", program), e))?;

        for reader in readers {
            if let Err(e) = reader.await {
                warn!("Output reader for {} ended abnormally: {}", program, e);
            }
        }

        let code = status.code().unwrap_or(-1);
        debug!(program = %program, code, "Process exited");
        Ok(code)
    }
}

/// Forwards every line of `stream` to `sink`, lossily decoding non-UTF-8 bytes.
async fn forward_lines<R, S>(stream: R, sink: Arc<S>)
where
    R: AsyncRead + Unpin,
    S: LineSink,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                sink.accept(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                debug!("Output stream closed: {}", e);
                break;
            }
        }
    }
}

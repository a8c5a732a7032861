// Cancellable process handles - spawning commands in their own process group

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TRUNCATION_MARKER: &[u8] = b"\n[output truncated]\n";

/// Everything needed to start one command
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub shell: String,
    pub command: String,
    pub working_dir: PathBuf,
    /// Bytes kept per stream; the remainder is drained and dropped
    pub max_output_bytes: usize,
    /// Wait between the polite and the forced signal on cancellation
    pub kill_grace: Duration,
}

/// Captured streams and exit status of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A running command that can be awaited or cancelled as a whole tree
#[async_trait]
pub trait ProcessHandle: Send {
    fn id(&self) -> Option<u32>;

    /// Wait for exit and for both streams to close. Dropping this future
    /// leaves the process running, so it can be wrapped in a timeout.
    async fn wait(&mut self) -> io::Result<ProcessOutput>;

    /// Terminate every process in the tree and reap the leader
    async fn terminate(&mut self) -> io::Result<()>;
}

/// Factory for process handles, swapped for a fake in tests
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawns `<shell> -c <command>` as the leader of a fresh process group
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let mut command = Command::new(&spec.shell);
        command
            .arg("-c")
            .arg(&spec.command)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr not captured"))?;

        debug!(pid = ?pid, shell = %spec.shell, "process group spawned");

        Ok(Box::new(SystemProcess {
            child,
            pid,
            stdout: Some(tokio::spawn(read_capped(stdout, spec.max_output_bytes))),
            stderr: Some(tokio::spawn(read_capped(stderr, spec.max_output_bytes))),
            status: None,
            kill_grace: spec.kill_grace,
        }))
    }
}

struct SystemProcess {
    child: Child,
    pid: Option<u32>,
    stdout: Option<JoinHandle<io::Result<Vec<u8>>>>,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
    status: Option<ExitStatus>,
    kill_grace: Duration,
}

#[async_trait]
impl ProcessHandle for SystemProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> io::Result<ProcessOutput> {
        let status = match self.status {
            Some(status) => status,
            None => {
                let status = self.child.wait().await?;
                self.status = Some(status);
                status
            }
        };

        let (stdout, stderr) = futures::try_join!(
            join_reader(&mut self.stdout),
            join_reader(&mut self.stderr)
        )?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: exit_code_of(status),
        })
    }

    async fn terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            if let Some(pid) = self.pid {
                signal_group(pid, Signal::SIGTERM);
                match tokio::time::timeout(self.kill_grace, self.child.wait()).await {
                    Ok(status) => self.status = Some(status?),
                    Err(_) => {
                        warn!(pid = pid, "process group ignored SIGTERM, escalating");
                    }
                }
                // members may outlive the leader
                signal_group(pid, Signal::SIGKILL);
            }
        }

        #[cfg(not(unix))]
        {
            self.child.start_kill()?;
        }

        if self.status.is_none() {
            self.status = Some(self.child.wait().await?);
        }

        // a reader still blocked means a detached process holds the pipe
        for reader in [self.stdout.take(), self.stderr.take()].into_iter().flatten() {
            reader.abort();
        }

        debug!(pid = ?self.pid, "process group terminated");
        Ok(())
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid = pid, signal = ?signal, error = %e, "failed to signal process group"),
    }
}

async fn join_reader(reader: &mut Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    let Some(handle) = reader.as_mut() else {
        return Ok(Vec::new());
    };
    let joined = handle.await;
    reader.take();
    joined.map_err(io::Error::other)?
}

/// Read a stream to EOF, keeping at most `cap` bytes
async fn read_capped<R: AsyncRead + Unpin>(mut stream: R, cap: usize) -> io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(kept.len());
        kept.extend_from_slice(&buf[..n.min(room)]);
        if n > room {
            truncated = true;
        }
    }

    if truncated {
        kept.extend_from_slice(TRUNCATION_MARKER);
    }
    Ok(kept)
}

/// Subprocess exit code; signal deaths map to `128 + signal`
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long stderr may stay open after the child itself has exited
const STDERR_GRACE: Duration = Duration::from_millis(250);

/// What to run: executable, arguments and working directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub executable: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(executable: impl Into<String>, args: Vec<String>, cwd: &Path) -> Self {
        Self { executable: executable.into(), args, cwd: cwd.to_path_buf() }
    }
}

/// The single terminal event of a started process
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessEvent {
    Exited { code: Option<i32>, stderr: String, killed: bool },
    Failed { error: String, killed: bool },
}

impl ProcessEvent {
    /// Whether [`ProcessHandle::kill`] was called before the process ended
    pub fn killed(&self) -> bool {
        match self {
            ProcessEvent::Exited { killed, .. } | ProcessEvent::Failed { killed, .. } => *killed,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ProcessEvent::Exited { code: Some(0), .. })
    }
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to start {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to capture {0} of child process")]
    MissingPipe(&'static str),
}

#[derive(Debug, Error)]
pub enum KillError {
    #[error("failed to kill process: {0}")]
    Kill(#[from] io::Error),

    #[error("process handle lock poisoned")]
    Poisoned,
}

struct SharedChild {
    child: Mutex<Child>,
    /// Only written while holding `child`, and only before the child is reaped
    killed: AtomicBool,
    /// Set once the terminal event is built, right before it is delivered
    finished: AtomicBool,
}

/// stderr collected on a reader thread, with a signal when the pipe closes
struct StderrCapture {
    bytes: Arc<Mutex<Vec<u8>>>,
    closed: Receiver<()>,
}

impl StderrCapture {
    fn start(mut stderr: ChildStderr) -> Self {
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let (closed_tx, closed) = mpsc::channel();
        let sink = Arc::clone(&bytes);
        thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match stderr.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = closed_tx.send(());
        });
        Self { bytes, closed }
    }

    /// Text received so far, waiting at most `grace` for the pipe to close
    ///
    /// Background grandchildren can inherit the pipe and hold it open long
    /// after the child exited; their output is not waited for.
    fn finish(self, grace: Duration) -> String {
        if !grace.is_zero() {
            let _ = self.closed.recv_timeout(grace);
        }
        self.bytes.lock().map(|buf| String::from_utf8_lossy(&buf).into_owned()).unwrap_or_default()
    }
}

/// Handle to one running external process
///
/// Cloning shares the same process; the watcher thread is the only party that
/// reports its end.
#[derive(Clone)]
pub struct ProcessHandle {
    pid: u32,
    shared: Arc<SharedChild>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProcessHandle {
    /// Spawns a process and arranges for `notify` to receive its terminal event
    ///
    /// stdin is closed, stdout is drained and discarded, stderr is collected and
    /// attached to the exit event. `notify` runs exactly once, on a background
    /// thread, after the process has been reaped; descendants still holding
    /// stderr open delay it by at most a short grace period.
    pub fn spawn<F>(invocation: &Invocation, notify: F) -> Result<Self, SpawnError>
    where
        F: FnOnce(ProcessEvent) + Send + 'static,
    {
        let mut child = Command::new(&invocation.executable)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SpawnError::Spawn {
                executable: invocation.executable.clone(),
                source,
            })?;
        let pid = child.id();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(mut stdout), Some(stderr)) = (stdout, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SpawnError::MissingPipe("stdout/stderr"));
        };

        thread::spawn(move || {
            let _ = io::copy(&mut stdout, &mut io::sink());
        });
        let stderr = StderrCapture::start(stderr);

        let shared = Arc::new(SharedChild {
            child: Mutex::new(child),
            killed: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });

        let watched = Arc::clone(&shared);
        thread::spawn(move || {
            let event = match wait_for_exit(&watched) {
                Ok((status, killed)) => {
                    let grace = if killed { Duration::ZERO } else { STDERR_GRACE };
                    let stderr = stderr.finish(grace);
                    debug!(pid, code = ?status.code(), killed, "external process exited");
                    ProcessEvent::Exited { code: status.code(), stderr, killed }
                }
                Err(e) => {
                    let killed = watched.killed.load(Ordering::SeqCst);
                    warn!(pid, error = %e, "lost track of external process");
                    ProcessEvent::Failed { error: e.to_string(), killed }
                }
            };
            watched.finished.store(true, Ordering::SeqCst);
            notify(event);
        });

        info!(pid, executable = %invocation.executable, cwd = %invocation.cwd.display(), "spawned external process");
        Ok(Self { pid, shared })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        !self.shared.finished.load(Ordering::SeqCst)
    }

    /// Whether a kill was requested for this process
    pub fn was_killed(&self) -> bool {
        self.shared.killed.load(Ordering::SeqCst)
    }

    /// Sends an OS-level kill; a no-op for a process that already ended
    ///
    /// The handle is marked killed only when the signal is actually sent, so
    /// the terminal event's `killed` flag always agrees with this call.
    pub fn kill(&self) -> Result<(), KillError> {
        if !self.is_running() {
            return Ok(());
        }

        let mut child = self.shared.child.lock().map_err(|_| KillError::Poisoned)?;
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        self.shared.killed.store(true, Ordering::SeqCst);
        match child.kill() {
            Ok(()) => {
                debug!(pid = self.pid, "killed external process");
                Ok(())
            }
            // Already reaped between the check and the kill
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(KillError::Kill(e)),
        }
    }
}

/// Polls until the child is reaped; also returns whether it was killed
///
/// The killed flag is read under the same lock as the reaping `try_wait`.
fn wait_for_exit(shared: &SharedChild) -> io::Result<(ExitStatus, bool)> {
    loop {
        {
            let mut child = shared
                .child
                .lock()
                .map_err(|_| io::Error::other("process handle lock poisoned"))?;
            if let Some(status) = child.try_wait()? {
                return Ok((status, shared.killed.load(Ordering::SeqCst)));
            }
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Owner of the at-most-one in-flight process
#[derive(Debug, Default)]
pub struct ProcessController {
    current: Option<ProcessHandle>,
}

impl ProcessController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a process, killing the current one first
    ///
    /// On spawn failure the slot is left empty and `notify` is dropped unused.
    pub fn start<F>(&mut self, invocation: &Invocation, notify: F) -> Result<&ProcessHandle, SpawnError>
    where
        F: FnOnce(ProcessEvent) + Send + 'static,
    {
        if let Err(e) = self.cancel() {
            warn!(error = %e, "failed to stop previous process before starting a new one");
        }
        let handle = ProcessHandle::spawn(invocation, notify)?;
        Ok(self.current.insert(handle))
    }

    /// Kills the current process if it is still running
    ///
    /// Returns whether a running process was signalled. Calling this with
    /// nothing in flight is a no-op.
    pub fn cancel(&mut self) -> Result<bool, KillError> {
        let Some(handle) = self.current.take() else {
            return Ok(false);
        };
        if !handle.is_running() {
            return Ok(false);
        }
        handle.kill()?;
        Ok(true)
    }

    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(ProcessHandle::is_running)
    }

    pub fn current(&self) -> Option<&ProcessHandle> {
        self.current.as_ref().filter(|h| h.is_running())
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}

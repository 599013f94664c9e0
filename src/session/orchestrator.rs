use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cleanup::{LogSnapshot, cleanup_incidental_sessions};
use super::prompt::compose_prompt;
use crate::config::AgentConfig;
use crate::models::{AgentSession, Message};
use crate::parsers::{read_history, read_preview};
use crate::process::{Invocation, ProcessController, ProcessEvent};
use crate::registry::ChatRegistry;
use crate::utils::{session_log_path, sessions_dir, validate_session_id};

/// Highest run id that `cancel` has covered, shared with every completion
#[derive(Clone, Debug, Default)]
struct CancelMark(Arc<AtomicU64>);

impl CancelMark {
    fn mark_through(&self, run_id: u64) {
        self.0.fetch_max(run_id, Ordering::SeqCst);
    }

    fn covers(&self, run_id: u64) -> bool {
        run_id <= self.0.load(Ordering::SeqCst)
    }
}

/// End of one `send_message` run, delivered exactly once per run
#[derive(Clone, Debug)]
pub struct Completion {
    /// Sequence number of the run, increasing per orchestrator
    pub run_id: u64,
    pub session_id: String,
    /// Human readable failure, `None` on a clean exit
    pub error: Option<String>,
    killed: bool,
    cancel_mark: CancelMark,
}

impl Completion {
    /// The run was stopped by `cancel` or replaced by a newer `send_message`
    ///
    /// Evaluated on every call: a cancel issued after the process had already
    /// exited, even after this completion was sent, still counts.
    pub fn cancelled(&self) -> bool {
        self.killed || self.cancel_mark.covers(self.run_id)
    }

    /// Error to show the user; cancelled runs never have one
    pub fn user_visible_error(&self) -> Option<&str> {
        if self.cancelled() { None } else { self.error.as_deref() }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.cancelled()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Awaiting { session_id: String },
}

/// One chat turn to send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRequest {
    pub text: String,
    pub working_dir: PathBuf,
    /// Resume this session; `None` starts a new one
    pub session_id: Option<String>,
    /// File the user has open, mentioned to the assistant as context
    pub current_file: Option<PathBuf>,
}

impl SendRequest {
    pub fn new(text: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            working_dir: working_dir.into(),
            session_id: None,
            current_file: None,
        }
    }

    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_current_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_file = Some(path.into());
        self
    }
}

enum SessionFlag<'a> {
    New(&'a str),
    Resume(&'a str),
}

/// Request/response/cancel/resume/history protocol for one window
///
/// Owns the in-flight process; nothing about it is global, so several
/// orchestrators (one per window or folder) do not interfere.
pub struct SessionOrchestrator {
    config: AgentConfig,
    claude_dir: PathBuf,
    controller: ProcessController,
    completions: Sender<Completion>,
    cancel_mark: CancelMark,
    next_run_id: u64,
    in_flight_session: Option<String>,
}

impl SessionOrchestrator {
    /// Creates an orchestrator together with its completion receiver
    ///
    /// The receiver exists before any message can be sent, so no completion
    /// can be missed.
    ///
    /// # Errors
    ///
    /// Returns an error if the external tool's home directory cannot be resolved.
    pub fn new(config: AgentConfig) -> Result<(Self, Receiver<Completion>)> {
        let (tx, rx) = mpsc::channel();
        Ok((Self::with_sender(config, tx)?, rx))
    }

    /// Creates an orchestrator reporting into an existing channel
    pub fn with_sender(config: AgentConfig, completions: Sender<Completion>) -> Result<Self> {
        let claude_dir = config.resolve_claude_dir()?;
        Ok(Self {
            config,
            claude_dir,
            controller: ProcessController::new(),
            completions,
            cancel_mark: CancelMark::default(),
            next_run_id: 1,
            in_flight_session: None,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Per-project directory holding session logs and the chat registry
    pub fn sessions_dir(&self, working_dir: &Path) -> PathBuf {
        sessions_dir(&self.claude_dir, working_dir)
    }

    pub fn state(&self) -> OrchestratorState {
        match (&self.in_flight_session, self.controller.is_busy()) {
            (Some(session_id), true) => {
                OrchestratorState::Awaiting { session_id: session_id.clone() }
            }
            _ => OrchestratorState::Idle,
        }
    }

    /// Sends one chat turn and returns its session id without waiting
    ///
    /// Any process still in flight is killed first; its completion reports
    /// `cancelled()`. A request without `session_id` starts a new
    /// session under a fresh id and registers it as one of ours.
    ///
    /// Every call that returns `Ok` produces exactly one [`Completion`] on the
    /// orchestrator's channel, including when the executable cannot be
    /// started. Callers must be listening on that channel before they act on
    /// the returned id (for instance by issuing another send or a cancel), or
    /// a fast exit can go unnoticed by their own flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the session id to resume is blank or not a plain
    /// file name, or if a new session cannot be recorded in the chat registry.
    /// Nothing is spawned and no completion is sent in those cases.
    pub fn send_message(&mut self, request: SendRequest) -> Result<String> {
        self.cancel();

        let sessions_dir = self.sessions_dir(&request.working_dir);
        let (session_id, is_new) = match request.session_id {
            Some(id) => {
                validate_session_id(&id)?;
                (id, false)
            }
            None => (Uuid::new_v4().to_string(), true),
        };

        if is_new {
            ChatRegistry::register(&sessions_dir, &self.config.application_name, &session_id)
                .context("Failed to register new chat session")?;
        }

        let prompt = compose_prompt(&request.text, request.current_file.as_deref());
        let flag =
            if is_new { SessionFlag::New(&session_id) } else { SessionFlag::Resume(&session_id) };
        let invocation = Invocation::new(
            self.config.executable.clone(),
            self.chat_args(flag, prompt),
            &request.working_dir,
        );

        let run_id = self.next_run_id;
        self.next_run_id += 1;

        let tx = self.completions.clone();
        let notify_session = session_id.clone();
        let notify_mark = self.cancel_mark.clone();
        let notify = move |event: ProcessEvent| {
            let completion = completion_from_event(run_id, notify_session, event, notify_mark);
            let _ = tx.send(completion);
        };

        match self.controller.start(&invocation, notify) {
            Ok(handle) => {
                info!(run_id, session_id = %session_id, pid = handle.pid(), new_session = is_new, "chat turn started");
                self.in_flight_session = Some(session_id.clone());
            }
            Err(e) => {
                warn!(run_id, session_id = %session_id, error = %e, "chat turn failed to start");
                self.in_flight_session = None;
                let _ = self.completions.send(Completion {
                    run_id,
                    session_id: session_id.clone(),
                    error: Some(e.to_string()),
                    killed: false,
                    cancel_mark: self.cancel_mark.clone(),
                });
            }
        }

        Ok(session_id)
    }

    /// Kills the in-flight process, if any
    ///
    /// Idempotent. Every run started so far counts as cancelled afterwards,
    /// including one that exited just before and whose completion is still
    /// unread.
    pub fn cancel(&mut self) {
        self.cancel_mark.mark_through(self.next_run_id.saturating_sub(1));
        match self.controller.cancel() {
            Ok(true) => debug!(session_id = ?self.in_flight_session, "cancelled chat turn"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to cancel chat turn"),
        }
        self.in_flight_session = None;
    }

    /// Registered conversations for a folder, newest first
    ///
    /// Sessions whose log is missing, unreadable or has no user text yet are
    /// left out.
    pub fn list_sessions(&self, working_dir: &Path) -> Vec<AgentSession> {
        let sessions_dir = self.sessions_dir(working_dir);
        let registry = ChatRegistry::load(&sessions_dir, &self.config.application_name);

        let mut sessions: Vec<AgentSession> = registry
            .ids()
            .iter()
            .filter_map(|id| {
                if let Err(e) = validate_session_id(id) {
                    warn!(error = %e, "skipping malformed chat registry entry");
                    return None;
                }
                let path = session_log_path(&sessions_dir, id);
                match read_preview(&path, self.config.preview_chars) {
                    Ok(preview) => preview.map(|p| AgentSession {
                        session_id: id.clone(),
                        timestamp: p.timestamp,
                        first_message_preview: p.first_message_preview,
                    }),
                    Err(e) => {
                        warn!(session_id = %id, error = %format!("{:#}", e), "skipping unreadable session log");
                        None
                    }
                }
            })
            .collect();

        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sessions
    }

    /// Replays a session from its log; no log yet means no messages
    pub fn load_history(&self, working_dir: &Path, session_id: &str) -> Vec<Message> {
        if let Err(e) = validate_session_id(session_id) {
            warn!(error = %e, "refusing to read session log");
            return Vec::new();
        }
        let path = session_log_path(&self.sessions_dir(working_dir), session_id);
        read_history(&path).unwrap_or_else(|e| {
            warn!(session_id, error = %format!("{:#}", e), "failed to read session log");
            Vec::new()
        })
    }

    /// Runs a blocking one-shot request and returns its stdout
    ///
    /// Session logs the external tool creates as a side effect are removed
    /// afterwards unless they are registered chats or agent artifacts. The
    /// in-flight chat process is not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable cannot be started or exits
    /// unsuccessfully.
    pub fn run_one_shot(&self, prompt: &str, working_dir: &Path) -> Result<String> {
        let sessions_dir = self.sessions_dir(working_dir);
        let before = LogSnapshot::capture(&sessions_dir)?;

        let result = self.execute_one_shot(prompt, working_dir);

        let registry = ChatRegistry::load(&sessions_dir, &self.config.application_name);
        match cleanup_incidental_sessions(&sessions_dir, &before, &registry) {
            Ok(outcome) if outcome.deleted > 0 || outcome.failed > 0 => {
                info!(deleted = outcome.deleted, failed = outcome.failed, kept = outcome.kept, "cleaned up one-shot session logs");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %format!("{:#}", e), "failed to clean up one-shot session logs"),
        }

        result
    }

    fn execute_one_shot(&self, prompt: &str, working_dir: &Path) -> Result<String> {
        let output = Command::new(&self.config.executable)
            .arg("-p")
            .arg("--model")
            .arg(&self.config.model)
            .arg(prompt)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to start {}", self.config.executable))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{}", exit_error_message(output.status.code(), &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn chat_args(&self, flag: SessionFlag<'_>, prompt: String) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            "--allowedTools".to_string(),
            self.config.allowed_tools_arg(),
            "--model".to_string(),
            self.config.model.clone(),
        ];
        match flag {
            SessionFlag::New(id) => args.extend(["--session-id".to_string(), id.to_string()]),
            SessionFlag::Resume(id) => args.extend(["--resume".to_string(), id.to_string()]),
        }
        args.push(prompt);
        args
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn exit_error_message(code: Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match code {
        _ if !stderr.is_empty() => stderr.to_string(),
        Some(code) => format!("process exited with code {}", code),
        None => "process terminated by signal".to_string(),
    }
}

fn completion_from_event(
    run_id: u64,
    session_id: String,
    event: ProcessEvent,
    cancel_mark: CancelMark,
) -> Completion {
    let killed = event.killed();
    let error = match event {
        ProcessEvent::Exited { code: Some(0), .. } => None,
        ProcessEvent::Exited { code, stderr, .. } => Some(exit_error_message(code, &stderr)),
        ProcessEvent::Failed { error, .. } => Some(error),
    };
    Completion { run_id, session_id, error, killed, cancel_mark }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn orchestrator(claude_dir: &Path) -> (SessionOrchestrator, Receiver<Completion>) {
        let config =
            AgentConfig { claude_dir: Some(claude_dir.to_path_buf()), ..Default::default() };
        SessionOrchestrator::new(config).unwrap()
    }

    #[test]
    fn test_completion_hides_cancelled_errors() {
        let completion = Completion {
            run_id: 1,
            session_id: "s".to_string(),
            error: Some("process terminated by signal".to_string()),
            killed: true,
            cancel_mark: CancelMark::default(),
        };
        assert_eq!(completion.user_visible_error(), None);
        assert!(!completion.is_success());
    }

    #[test]
    fn test_completion_from_events() {
        let ok = completion_from_event(
            1,
            "s".into(),
            ProcessEvent::Exited { code: Some(0), stderr: "noise".into(), killed: false },
            CancelMark::default(),
        );
        assert!(ok.is_success());

        let failed = completion_from_event(
            2,
            "s".into(),
            ProcessEvent::Exited { code: Some(2), stderr: "  auth expired\n".into(), killed: false },
            CancelMark::default(),
        );
        assert_eq!(failed.user_visible_error(), Some("auth expired"));

        let silent = completion_from_event(
            3,
            "s".into(),
            ProcessEvent::Exited { code: Some(1), stderr: String::new(), killed: false },
            CancelMark::default(),
        );
        assert_eq!(silent.error.as_deref(), Some("process exited with code 1"));

        let killed = completion_from_event(
            4,
            "s".into(),
            ProcessEvent::Exited { code: None, stderr: String::new(), killed: true },
            CancelMark::default(),
        );
        assert!(killed.cancelled());
        assert_eq!(killed.error.as_deref(), Some("process terminated by signal"));
        assert_eq!(killed.user_visible_error(), None);
    }

    #[test]
    fn test_cancel_mark_reaches_completions_already_sent() {
        let mark = CancelMark::default();
        let failed = completion_from_event(
            3,
            "s".into(),
            ProcessEvent::Exited { code: Some(1), stderr: "boom".into(), killed: false },
            mark.clone(),
        );
        assert_eq!(failed.user_visible_error(), Some("boom"));

        mark.mark_through(2);
        assert!(!failed.cancelled());

        mark.mark_through(3);
        assert!(failed.cancelled());
        assert_eq!(failed.user_visible_error(), None);

        // The mark never moves backwards
        mark.mark_through(1);
        assert!(failed.cancelled());
    }

    #[test]
    fn test_chat_args_for_new_and_resumed_sessions() {
        let dir = TempDir::new().unwrap();
        let (orch, _rx) = orchestrator(dir.path());

        let args = orch.chat_args(SessionFlag::New("abc"), "prompt text".into());
        assert_eq!(
            args,
            ["-p", "--allowedTools", "Read,Glob,Grep", "--model", "sonnet", "--session-id", "abc", "prompt text"]
        );

        let args = orch.chat_args(SessionFlag::Resume("abc"), "again".into());
        assert_eq!(&args[5..], ["--resume", "abc", "again"]);
    }

    #[test]
    fn test_idle_cancel_is_noop() {
        let dir = TempDir::new().unwrap();
        let (mut orch, rx) = orchestrator(dir.path());
        orch.cancel();
        orch.cancel();
        assert_eq!(orch.state(), OrchestratorState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_spawn_failure_completes_with_error() {
        let dir = TempDir::new().unwrap();
        let config = AgentConfig {
            claude_dir: Some(dir.path().to_path_buf()),
            executable: "/definitely/not/here/claude".to_string(),
            ..Default::default()
        };
        let (mut orch, rx) = SessionOrchestrator::new(config).unwrap();

        let id = orch.send_message(SendRequest::new("hi", dir.path())).unwrap();
        let completion = rx.recv().unwrap();
        assert_eq!(completion.session_id, id);
        assert!(!completion.cancelled());
        let error = completion.user_visible_error().unwrap();
        assert!(error.starts_with("failed to start /definitely/not/here/claude"));
        assert_eq!(orch.state(), OrchestratorState::Idle);
    }

    #[test]
    fn test_resume_with_blank_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut orch, rx) = orchestrator(dir.path());
        let err = orch.send_message(SendRequest::new("hi", dir.path()).resume("  ")).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_resume_with_path_like_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut orch, rx) = orchestrator(dir.path());
        for id in ["../../x", "nested/id", r"..\x"] {
            let err = orch.send_message(SendRequest::new("hi", dir.path()).resume(id)).unwrap_err();
            assert!(err.to_string().contains("path separators"), "{}", err);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_history_never_reads_outside_sessions_dir() {
        let dir = TempDir::new().unwrap();
        let (orch, _rx) = orchestrator(dir.path());
        let vault = Path::new("/vault");

        // A log one level above the sessions directory
        let outside = dir.path().join("projects").join("outside.jsonl");
        std::fs::create_dir_all(outside.parent().unwrap()).unwrap();
        std::fs::write(
            &outside,
            r#"{"type":"user","message":{"role":"user","content":"secret"}}"#,
        )
        .unwrap();
        assert_eq!(
            session_log_path(&orch.sessions_dir(vault), "../outside"),
            orch.sessions_dir(vault).join("../outside.jsonl")
        );

        assert!(orch.load_history(vault, "../outside").is_empty());
    }

    #[test]
    fn test_history_of_unknown_session_is_empty() {
        let dir = TempDir::new().unwrap();
        let (orch, _rx) = orchestrator(dir.path());
        assert!(orch.load_history(Path::new("/vault"), "nope").is_empty());
        assert!(orch.list_sessions(Path::new("/vault")).is_empty());
    }
}

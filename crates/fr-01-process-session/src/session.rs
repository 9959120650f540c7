//! # Process Session
//!
//! One spawned shell command and its live event stream.
//!
//! ```text
//!   stdout reader ──┐
//!                   ├──→ OutputQueue ──→ next_event() ←── heartbeat tick
//!   stderr reader ──┘         ↑
//!                             │ end (exactly once)
//!   supervisor ───────────────┘
//!     select { readers EOF + exit | cancel signal | deadline }
//! ```

use futures::Stream;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SpawnError;
use crate::queue::OutputQueue;
use crate::reader;
use crate::shell::{self, platform_shell};
use crate::state::{advance, CancelReason, SessionState};
use shared_types::{StreamEvent, SUCCESS_SUMMARY};

type CancelSender = Arc<watch::Sender<Option<CancelReason>>>;

/// Cloneable trigger for a session's cancellation.
#[derive(Clone)]
pub struct CancelHandle {
    sender: CancelSender,
}

impl CancelHandle {
    /// Request cancellation. The first reason recorded wins.
    pub fn cancel(&self, reason: CancelReason) {
        request_cancel(&self.sender, reason);
    }
}

fn request_cancel(sender: &CancelSender, reason: CancelReason) -> bool {
    sender.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(reason);
        true
    })
}

pub struct ProcessSession {
    id: Uuid,
    pid: Option<u32>,
    output: mpsc::Receiver<StreamEvent>,
    heartbeat: Interval,
    cancel: CancelSender,
    state: watch::Receiver<SessionState>,
    finished: bool,
}

impl ProcessSession {
    /// Start `command` under the platform shell.
    ///
    /// Must be called inside a tokio runtime. Errors here happen before any
    /// event exists.
    pub fn spawn(command: &str, config: &SessionConfig) -> Result<Self, SpawnError> {
        if command.trim().is_empty() {
            return Err(SpawnError::EmptyCommand);
        }

        let shell = platform_shell();
        let mut child = shell
            .command(command)
            .spawn()
            .map_err(|source| SpawnError::Start {
                shell: shell.program.to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(SpawnError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::Pipe("stderr"))?;

        let id = Uuid::new_v4();
        let pid = child.id();
        let (queue, output) = OutputQueue::new(config.queue_capacity);
        let (cancel_tx, cancel_rx) = watch::channel(None);
        let cancel = Arc::new(cancel_tx);
        let (state_tx, state) = watch::channel(SessionState::Idle);
        advance(&state_tx, SessionState::Running { pid });
        info!(session = %id, ?pid, shell = shell.program, "session started");

        let readers = Readers {
            handles: vec![
                tokio::spawn(reader::pump(stdout, "stdout", queue.clone(), cancel_rx.clone())),
                tokio::spawn(reader::pump(stderr, "stderr", queue.clone(), cancel_rx.clone())),
            ],
        };

        tokio::spawn(
            Supervisor {
                id,
                child,
                readers,
                queue,
                cancel: cancel.clone(),
                cancel_rx,
                state: state_tx,
                deadline: Instant::now() + config.deadline,
                kill_grace: config.kill_grace,
            }
            .run(),
        );

        let period = config.heartbeat_interval.max(Duration::from_millis(1));
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            id,
            pid,
            output,
            heartbeat,
            cancel,
            state,
            finished: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch for lifecycle transitions.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Caller);
    }

    pub fn cancel_with(&self, reason: CancelReason) {
        if request_cancel(&self.cancel, reason) {
            debug!(session = %self.id, %reason, "cancellation requested");
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: self.cancel.clone(),
        }
    }

    /// Next event in arrival order: output first when both are ready,
    /// otherwise a heartbeat on each tick.
    ///
    /// Returns `None` after the terminal `end` event.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        tokio::select! {
            biased;
            event = self.output.recv() => match event {
                Some(event) => {
                    if event.is_terminal() {
                        self.finished = true;
                    }
                    Some(event)
                }
                None => {
                    self.finished = true;
                    None
                }
            },
            _ = self.heartbeat.tick() => Some(StreamEvent::heartbeat()),
        }
    }

    /// Consume the session as a stream. Dropping the stream cancels the
    /// session as disconnected.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        })
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel_with(CancelReason::Disconnected);
        }
    }
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

// =============================================================================
// SUPERVISOR
// =============================================================================

struct Readers {
    handles: Vec<JoinHandle<()>>,
}

impl Readers {
    /// Wait for both readers. Safe to call again after being interrupted.
    async fn join(&mut self) {
        while let Some(handle) = self.handles.last_mut() {
            if let Err(e) = handle.await {
                warn!(error = %e, "pipe reader task failed");
            }
            self.handles.pop();
        }
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled(CancelReason),
}

struct Supervisor {
    id: Uuid,
    child: Child,
    readers: Readers,
    queue: Arc<OutputQueue>,
    cancel: CancelSender,
    cancel_rx: watch::Receiver<Option<CancelReason>>,
    state: watch::Sender<SessionState>,
    deadline: Instant,
    kill_grace: Duration,
}

impl Supervisor {
    async fn run(self) {
        let Supervisor {
            id,
            mut child,
            mut readers,
            queue,
            cancel,
            mut cancel_rx,
            state,
            deadline,
            kill_grace,
        } = self;

        let outcome = tokio::select! {
            status = async {
                readers.join().await;
                child.wait().await
            } => Outcome::Exited(status),
            reason = cancelled(&mut cancel_rx) => Outcome::Cancelled(reason),
            _ = time::sleep_until(deadline) => {
                request_cancel(&cancel, CancelReason::Deadline);
                Outcome::Cancelled((*cancel.borrow()).unwrap_or(CancelReason::Deadline))
            }
        };

        let terminal = match outcome {
            Outcome::Exited(Ok(status)) => SessionState::Completed {
                code: status.code(),
                summary: summarize(status),
            },
            Outcome::Exited(Err(e)) => {
                if let Err(kill) = child.start_kill() {
                    debug!(session = %id, error = %kill, "kill after wait error failed");
                }
                SessionState::Failed {
                    message: e.to_string(),
                }
            }
            Outcome::Cancelled(reason) => {
                shell::terminate(&mut child, kill_grace).await;
                readers.join().await;
                SessionState::Cancelled { reason }
            }
        };

        let payload = terminal.end_payload().unwrap_or_default();
        info!(session = %id, outcome = %payload, "session ended");
        if !queue.finish(StreamEvent::end(payload)).await {
            debug!(session = %id, "consumer gone before end event");
        }
        advance(&state, terminal);
    }
}

async fn cancelled(rx: &mut watch::Receiver<Option<CancelReason>>) -> CancelReason {
    loop {
        if let Some(reason) = *rx.borrow_and_update() {
            return reason;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

fn summarize(status: ExitStatus) -> String {
    if status.success() {
        return SUCCESS_SUMMARY.to_string();
    }
    match status.code() {
        Some(code) => format!("completed, exit {code}"),
        None => format!("completed, exit {status}"),
    }
}

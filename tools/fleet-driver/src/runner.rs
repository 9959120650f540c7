//! Walks selected services step by step.
//!
//! Steps run in file order; `up` and `cmd` steps run against each host in
//! turn. A failed step is reported and the run moves on. An interrupt
//! cancels the step in flight and ends the run.

use fr_01_process_session::{ProcessSession, SessionConfig, SpawnError};
use fr_03_channel_client::{ChannelClient, ClientConfig, ClientError};
use futures::StreamExt;
use shared_crypto::EnvelopeSigner;
use shared_types::{StreamEvent, FIELD_COMMAND};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::flow::{ServiceFlow, Step};
use crate::render::Console;

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// The agent answered with a non-success result
    #[error("agent refused: {0}")]
    Rejected(String),

    #[error("command {0}")]
    Unsuccessful(String),

    #[error("stream ended without an end event")]
    NoEnd,

    #[error("interrupted")]
    Interrupted,
}

/// Outcome of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub succeeded: usize,
    pub failures: Vec<String>,
    pub interrupted: bool,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.interrupted
    }
}

pub struct Runner<O: Write, E: Write> {
    signer: EnvelopeSigner,
    session: SessionConfig,
    client: ClientConfig,
    interrupt: watch::Receiver<bool>,
    console: Console<O, E>,
}

impl<O: Write, E: Write> Runner<O, E> {
    /// `interrupt` flips to `true` on Ctrl+C.
    pub fn new(
        signer: EnvelopeSigner,
        interrupt: watch::Receiver<bool>,
        console: Console<O, E>,
    ) -> Self {
        Self {
            signer,
            session: SessionConfig::default(),
            client: ClientConfig::default(),
            interrupt,
            console,
        }
    }

    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_client_config(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn into_console(self) -> Console<O, E> {
        self.console
    }

    pub async fn run(&mut self, services: &[(&str, &ServiceFlow)]) -> Report {
        let mut report = Report::default();

        for (name, flow) in services {
            self.console.step(&format!("service {name}"));
            for step in &flow.steps {
                if *self.interrupt.borrow() {
                    report.interrupted = true;
                    return report;
                }
                self.run_step(name, flow, step, &mut report).await;
            }
            self.console.success(&format!("service {name} done"));
        }

        report.interrupted = *self.interrupt.borrow();
        report
    }

    async fn run_step(
        &mut self,
        service: &str,
        flow: &ServiceFlow,
        step: &Step,
        report: &mut Report,
    ) {
        match step {
            Step::LocalCmd { command } => {
                self.console.info(&format!("local: {command}"));
                let result = self.local(command).await;
                self.record(report, service, step, "local", result);
            }
            Step::Upload {
                local_path,
                remote_path,
            } => {
                for host in &flow.hosts {
                    self.console.info(&format!(
                        "upload to {host}: {} -> {remote_path}",
                        local_path.display()
                    ));
                    let result = self.upload(host, local_path, remote_path).await;
                    self.record(report, service, step, host, result);
                }
            }
            Step::RemoteCmd { command } => {
                for host in &flow.hosts {
                    if *self.interrupt.borrow() {
                        return;
                    }
                    self.console.info(&format!("[{host}] run: {command}"));
                    let result = self.remote(host, command).await;
                    self.record(report, service, step, host, result);
                }
            }
        }
    }

    fn record(
        &mut self,
        report: &mut Report,
        service: &str,
        step: &Step,
        origin: &str,
        result: Result<(), StepError>,
    ) {
        match result {
            Ok(()) => {
                report.succeeded += 1;
                self.console
                    .success(&format!("{service} {} on {origin}", step.kind()));
            }
            Err(e) => {
                let message = format!("{service} {} on {origin}: {e}", step.kind());
                self.console.failure(&message);
                report.failures.push(message);
            }
        }
    }

    /// Run a command on this host through a local session.
    async fn local(&mut self, command: &str) -> Result<(), StepError> {
        let mut session = ProcessSession::spawn(command, &self.session)?;
        let mut interrupt = self.interrupt.clone();
        let mut cancelled = false;
        let mut end = None;

        loop {
            tokio::select! {
                event = session.next_event() => match event {
                    Some(event) => {
                        self.console.event("local", &event);
                        if event.is_terminal() {
                            end = Some(event);
                        }
                    }
                    None => break,
                },
                _ = interrupted(&mut interrupt), if !cancelled => {
                    warn!(%command, "interrupt received; cancelling local command");
                    session.cancel();
                    cancelled = true;
                }
            }
        }

        finish(end, cancelled)
    }

    /// Stream a command on `host`.
    async fn remote(&mut self, host: &str, command: &str) -> Result<(), StepError> {
        let client = ChannelClient::with_config(host, self.signer.clone(), self.client.clone())?
            .form_param(FIELD_COMMAND, command);
        client.connect().await?;
        let mut events = client.events()?;
        let mut errors = client.errors()?;
        let mut interrupt = self.interrupt.clone();
        let mut errors_open = true;
        let mut cancelled = false;
        let mut end = None;

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => {
                        self.console.event(host, &event);
                        if event.is_terminal() {
                            end = Some(event);
                        }
                    }
                    None => break,
                },
                err = errors.next(), if errors_open => match err {
                    Some(e) => self.console.failure(&format!("[{host}] {e}")),
                    None => errors_open = false,
                },
                _ = interrupted(&mut interrupt), if !cancelled => {
                    warn!(%host, "interrupt received; closing remote command");
                    client.close();
                    cancelled = true;
                }
            }
        }

        debug!(%host, connected = client.is_connected(), "remote command stream done");
        finish(end, cancelled)
    }

    async fn upload(
        &mut self,
        host: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), StepError> {
        let client = ChannelClient::with_config(host, self.signer.clone(), self.client.clone())?;
        let result = client.upload(local_path, remote_path).await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(StepError::Rejected(result.message))
        }
    }
}

fn finish(end: Option<StreamEvent>, cancelled: bool) -> Result<(), StepError> {
    match end {
        Some(end) if end.is_success() => Ok(()),
        Some(end) => Err(StepError::Unsuccessful(end.payload)),
        None if cancelled => Err(StepError::Interrupted),
        None => Err(StepError::NoEnd),
    }
}

/// Resolves once the flag is `true`; never if the sender is gone.
async fn interrupted(rx: &mut watch::Receiver<bool>) {
    let raised = rx.wait_for(|flag| *flag).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}

//! Headless lifecycle driver.
//!
//! Reads JSON-line [`Command`]s, drives a [`SessionController`], and writes
//! JSON-line [`Event`]s. Notices raised while a command runs are written right
//! after its response; notices from pushed status events are written as they
//! arrive.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use sshdesk_core::ClientConfig;
use sshdesk_session::{
    ChannelNotifier, ControllerConfig, Notice, SessionController, StaticConnections, StatusBridge,
};

use crate::commands::{Command, Event};
use crate::sim::SimulatedTransport;

/// JSON-lines front end for a [`SessionController`].
pub struct Driver<W> {
    controller: SessionController,
    notices: mpsc::UnboundedReceiver<Notice>,
    out: W,
    _bridge: StatusBridge,
}

impl<W: AsyncWrite + Unpin> Driver<W> {
    /// Wrap a controller whose notifier feeds `notices`, and start the status
    /// bridge for its transport.
    pub fn new(
        controller: SessionController,
        notices: mpsc::UnboundedReceiver<Notice>,
        out: W,
    ) -> Self {
        let bridge = StatusBridge::spawn(&controller);
        Self {
            controller,
            notices,
            out,
            _bridge: bridge,
        }
    }

    /// Build a driver over a [`SimulatedTransport`] serving the configured
    /// connections.
    pub fn with_simulation(
        config: &ClientConfig,
        latency: Duration,
        out: W,
    ) -> (Self, Arc<SimulatedTransport>) {
        let connections = Arc::new(StaticConnections::new(config.connections.clone()));
        let transport = Arc::new(SimulatedTransport::new(connections.clone(), latency));
        let (notifier, notices) = ChannelNotifier::new();
        let controller = SessionController::with_config(
            transport.clone(),
            connections,
            Arc::new(notifier),
            ControllerConfig::from(config),
        );
        (Self::new(controller, notices, out), transport)
    }

    /// The controller being driven.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Output written so far.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Consume the driver, returning its output.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Process input until it ends, then close every session.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> anyhow::Result<()> {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await?,
                    None => break,
                },
                Some(notice) = self.notices.recv() => {
                    self.emit(&Event::Notice(notice)).await?;
                }
            }
        }

        info!("Input closed, shutting down");
        self.controller.shutdown().await;
        self.flush_notices().await
    }

    /// Handle one input line.
    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let event = match serde_json::from_str::<Command>(line) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                warn!("Rejected input line: {}", e);
                Event::Error {
                    message: format!("invalid command: {e}"),
                }
            }
        };
        self.emit(&event).await?;
        self.flush_notices().await
    }

    /// Write every notice already queued.
    pub async fn flush_notices(&mut self) -> anyhow::Result<()> {
        while let Ok(notice) = self.notices.try_recv() {
            self.emit(&Event::Notice(notice)).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(cmd = command.name()))]
    async fn execute(&self, command: Command) -> Event {
        let cmd = command.name();
        debug!("Executing command");

        let (ok, result) = match command {
            Command::Connect { connection_id } => {
                let session = self.controller.start_session(&connection_id).await;
                (session.is_some(), to_value(&session))
            }
            Command::Retry { session_id, auth } => {
                let outcome = self.controller.retry_session_auth(&session_id, auth).await;
                (outcome.is_ok(), to_value(&outcome))
            }
            Command::Close { session_id } => {
                (self.controller.close_session(&session_id), Value::Null)
            }
            Command::Reconnect { session_id } => {
                match self.controller.reconnect_session(&session_id) {
                    Some(pending) => {
                        let session = pending.await;
                        (session.is_some(), to_value(&session))
                    }
                    None => (false, Value::Null),
                }
            }
            Command::Activate { connection_id } => {
                self.controller.activate_connection(&connection_id);
                (true, Value::Null)
            }
            Command::Monitor { connection_id } => {
                let session = self.controller.open_monitor(&connection_id);
                (true, to_value(&session))
            }
            Command::CloseConnection { connection_id } => {
                let closed = self.controller.close_connection(&connection_id);
                (closed > 0, json!({ "closed": closed }))
            }
            Command::Rename { session_id, title } => {
                let known = self.controller.session(&session_id).is_some();
                self.controller.rename_session(&session_id, title);
                (known, Value::Null)
            }
            Command::List => (true, Value::Null),
        };

        Event::Response {
            cmd: cmd.to_string(),
            ok,
            result,
            snapshot: self.controller.snapshot(),
        }
    }

    async fn emit(&mut self, event: &Event) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for Driver<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

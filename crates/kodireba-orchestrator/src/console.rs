//! Console bridge between the preview frame and the lesson page.
//!
//! The sandbox shim posts `{type: "console", level, msg}` messages to the
//! page. The [`ConsoleBridge`] receives them through a [`ConsolePort`], tags
//! each with the render key of the frame that sent it, and appends the ones
//! from the current run to an ordered [`ConsoleLog`].
//!
//! # Message Rules
//!
//! - Messages whose `type` is not `console` are ignored
//! - Malformed payloads are dropped with a debug log
//! - A new run clears the log; messages from older runs are discarded
//! - After [`ConsoleBridge::detach`], posts are dropped at the port
//!
//! # Example
//!
//! ```
//! use kodireba_orchestrator::console::{ConsoleBridge, ConsoleLevel};
//!
//! let mut bridge = ConsoleBridge::new();
//! let port = bridge.port();
//! bridge.begin_run(1);
//!
//! port.post(1, r#"{"type":"console","level":"error","msg":"x is not defined"}"#);
//! bridge.drain();
//!
//! assert_eq!(bridge.log().len(), 1);
//! assert_eq!(bridge.log().entries()[0].level, ConsoleLevel::Error);
//! assert!(bridge.log().has_errors());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

// ============================================================================
// Wire Messages
// ============================================================================

/// Severity of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.log`.
    Log,
    /// `console.warn`.
    Warn,
    /// `console.error` or an uncaught error.
    Error,
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A console message as posted by the sandbox shim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleMessage {
    /// Severity.
    pub level: ConsoleLevel,
    /// Formatted message text.
    #[serde(default)]
    pub msg: String,
    /// Source line, for uncaught errors.
    #[serde(default)]
    pub line: Option<u32>,
}

impl ConsoleMessage {
    /// Parses a raw posted message.
    ///
    /// Returns `None` for messages of another type and for malformed console
    /// payloads.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Dropping unparseable frame message");
                return None;
            }
        };

        if value.get("type").and_then(Value::as_str) != Some("console") {
            debug!("Ignoring non-console frame message");
            return None;
        }

        match serde_json::from_value(value) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(error = %e, "Dropping malformed console message");
                None
            }
        }
    }
}

// ============================================================================
// Console Log
// ============================================================================

/// One line in the console pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Severity.
    pub level: ConsoleLevel,
    /// Message text.
    pub message: String,
    /// Source line, for uncaught errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// When the page received the message.
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only console buffer for the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleLog {
    entries: Vec<ConsoleEntry>,
}

impl ConsoleLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a message, stamped with the current time.
    pub fn push(&mut self, message: ConsoleMessage) {
        self.entries.push(ConsoleEntry {
            level: message.level,
            message: message.msg,
            line: message.line,
            timestamp: Utc::now(),
        });
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the entries in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[ConsoleEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if at least one error line exists.
    ///
    /// This gates the "AI ახსნა" action.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.level == ConsoleLevel::Error)
    }

    /// Returns the most recent error line.
    #[must_use]
    pub fn last_error(&self) -> Option<&ConsoleEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.level == ConsoleLevel::Error)
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// The sending side handed to a preview frame.
///
/// Cloneable; every clone stops delivering once the bridge detaches.
#[derive(Debug, Clone)]
pub struct ConsolePort {
    sender: mpsc::UnboundedSender<(u64, String)>,
    attached: Arc<AtomicBool>,
}

impl ConsolePort {
    /// Posts a raw message from the frame rendered under `run_key`.
    ///
    /// Returns `false` if the bridge is detached and the message was dropped.
    pub fn post(&self, run_key: u64, raw: impl Into<String>) -> bool {
        if !self.attached.load(Ordering::Acquire) {
            return false;
        }
        self.sender.send((run_key, raw.into())).is_ok()
    }

    /// Returns `true` while the bridge is listening.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// Receives frame messages and maintains the console log.
#[derive(Debug)]
pub struct ConsoleBridge {
    receiver: mpsc::UnboundedReceiver<(u64, String)>,
    port: ConsolePort,
    active_run: u64,
    log: ConsoleLog,
}

impl Default for ConsoleBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleBridge {
    /// Creates an attached bridge with an empty log.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            receiver,
            port: ConsolePort {
                sender,
                attached: Arc::new(AtomicBool::new(true)),
            },
            active_run: 0,
            log: ConsoleLog::new(),
        }
    }

    /// Returns a port for a frame to post through.
    #[must_use]
    pub fn port(&self) -> ConsolePort {
        self.port.clone()
    }

    /// Starts a new run: clears the log and accepts only `run_key` messages.
    pub fn begin_run(&mut self, run_key: u64) {
        self.drain();
        self.active_run = run_key;
        self.log.clear();
    }

    /// Returns the run whose messages are accepted.
    #[must_use]
    pub const fn active_run(&self) -> u64 {
        self.active_run
    }

    /// Moves every pending message into the log.
    ///
    /// Returns the number of entries appended.
    pub fn drain(&mut self) -> usize {
        let mut appended = 0;
        while let Ok((run_key, raw)) = self.receiver.try_recv() {
            if self.accept(run_key, &raw) {
                appended += 1;
            }
        }
        appended
    }

    /// Waits for the next message and processes it.
    ///
    /// Returns `false` once the bridge is detached and no messages remain.
    pub async fn recv(&mut self) -> bool {
        match self.receiver.recv().await {
            Some((run_key, raw)) => {
                self.accept(run_key, &raw);
                true
            }
            None => false,
        }
    }

    fn accept(&mut self, run_key: u64, raw: &str) -> bool {
        if run_key != self.active_run {
            debug!(
                run_key,
                active_run = self.active_run,
                "Discarding message from stale run"
            );
            return false;
        }
        match ConsoleMessage::parse(raw) {
            Some(message) => {
                self.log.push(message);
                true
            }
            None => false,
        }
    }

    /// Returns the console log.
    #[must_use]
    pub const fn log(&self) -> &ConsoleLog {
        &self.log
    }

    /// Clears the log locally.
    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Stops listening. Pending and future posts are dropped.
    pub fn detach(&mut self) {
        self.port.attached.store(false, Ordering::Release);
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
        debug!("Console bridge detached");
    }

    /// Returns `true` while the bridge is listening.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.port.is_attached()
    }
}

impl Drop for ConsoleBridge {
    fn drop(&mut self) {
        self.port.attached.store(false, Ordering::Release);
    }
}

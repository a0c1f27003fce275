//! The newline-delimited JSON event stream a run produces.
//!
//! Every line is one of `{"log": {...}}`, `{"stage": ..., "message": ...}` or
//! `{"result": {"errors": [...]}}`. A run emits exactly one result, last.

use crate::model::Finding;
use crate::util::clock_hms_millis;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extracting,
    Distributing,
    Analyzing,
    Finalizing,
    Locating,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracting => "extracting",
            Stage::Distributing => "distributing",
            Stage::Analyzing => "analyzing",
            Stage::Finalizing => "finalizing",
            Stage::Locating => "locating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub errors: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Log { log: LogRecord },
    Stage { stage: Stage, message: String },
    Result { result: RunResult },
}

impl Event {
    pub fn is_result(&self) -> bool {
        matches!(self, Event::Result { .. })
    }
}

pub fn write_ndjson<W: Write>(w: &mut W, event: &Event) -> std::io::Result<()> {
    serde_json::to_writer(&mut *w, event)?;
    w.write_all(b"\n")?;
    w.flush()
}

/// Sending half of a run's event stream. Log events are mirrored into
/// `tracing` at the matching level.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<Event>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// True once the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stage(&self, stage: Stage, message: &str) {
        info!("stage {}: {message}", stage.as_str());
        self.send(Event::Stage {
            stage,
            message: message.to_string(),
        });
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Error | LogLevel::Critical => error!("{message}"),
        }
        self.send(Event::Log {
            log: LogRecord {
                timestamp: clock_hms_millis(),
                level,
                message,
            },
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn result(&self, errors: Vec<Finding>) {
        self.send(Event::Result {
            result: RunResult { errors },
        });
    }

    fn send(&self, event: Event) {
        // A closed receiver means the caller abandoned the run.
        let _ = self.tx.send(event);
    }
}

use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

// ─── Events ──────────────────────────────────────────────────────────

/// Fire-and-forget observability events. Whoever is listening (a log
/// viewer, a test, nobody at all) gets them; delivery failure is ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    SubtitleDetected {
        original: String,
        timestamp: String,
    },
    TranslationComplete {
        original: String,
        translated: String,
        timestamp: String,
    },
    TranslationError {
        original: String,
        error: String,
        timestamp: String,
    },
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl DiagnosticEvent {
    pub fn detected(original: &str) -> Self {
        DiagnosticEvent::SubtitleDetected {
            original: original.to_string(),
            timestamp: now(),
        }
    }

    pub fn complete(original: &str, translated: &str) -> Self {
        DiagnosticEvent::TranslationComplete {
            original: original.to_string(),
            translated: translated.to_string(),
            timestamp: now(),
        }
    }

    pub fn error(original: &str, error: &str) -> Self {
        DiagnosticEvent::TranslationError {
            original: original.to_string(),
            error: error.to_string(),
            timestamp: now(),
        }
    }

    pub fn original(&self) -> &str {
        match self {
            DiagnosticEvent::SubtitleDetected { original, .. }
            | DiagnosticEvent::TranslationComplete { original, .. }
            | DiagnosticEvent::TranslationError { original, .. } => original,
        }
    }
}

// ─── Sink ────────────────────────────────────────────────────────────

/// Fan-out for diagnostic events: an optional channel and an optional
/// JSONL file. Every failure path (closed channel, serialization or I/O
/// error) degrades to a no-op after at most a stderr warning.
#[derive(Clone)]
pub struct DiagnosticSink {
    tx: Option<UnboundedSender<DiagnosticEvent>>,
    file: Option<Arc<Mutex<File>>>,
}

impl DiagnosticSink {
    pub fn disabled() -> Self {
        Self {
            tx: None,
            file: None,
        }
    }

    /// Sink delivering events over a channel.
    pub fn channel() -> (Self, UnboundedReceiver<DiagnosticEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            Self {
                tx: Some(tx),
                file: None,
            },
            rx,
        )
    }

    /// Additionally append events to a JSONL file.
    pub fn log_to_file(mut self, path: &Path) -> Self {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => self.file = Some(Arc::new(Mutex::new(f))),
            Err(e) => {
                eprintln!("Warning: could not open diagnostics file '{}': {}", path.display(), e);
            }
        }
        self
    }

    pub fn emit(&self, event: DiagnosticEvent) {
        if let Some(file) = &self.file {
            if let Ok(json) = serde_json::to_string(&event) {
                let mut f = file.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = writeln!(f, "{}", json);
            }
        }
        if let Some(tx) = &self.tx {
            // No listener is a normal condition, not an error.
            let _ = tx.send(event);
        }
    }
}

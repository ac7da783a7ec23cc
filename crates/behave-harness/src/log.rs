#![forbid(unsafe_code)]

//! Ordered lifecycle recorder with JSONL export.
//!
//! Every fixture in this crate writes into a shared [`LifecycleLog`]. Tests
//! assert on [`labels`](LifecycleLog::labels) (`"attach m1"`,
//! `"detach m1"`, ...) and can dump the full record as JSONL for offline
//! inspection.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::rc::Rc;

use behave_core::HostId;
use serde_json::{Value, json};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Attached,
    Detaching,
    ContextChanged,
    CollectionAttached,
    CollectionDetaching,
    HostLoaded,
    HostUnloaded,
}

impl EventKind {
    /// Short label used in [`LifecycleLog::labels`] and JSONL.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attached => "attach",
            Self::Detaching => "detach",
            Self::ContextChanged => "context",
            Self::CollectionAttached => "collection_attach",
            Self::CollectionDetaching => "collection_detach",
            Self::HostLoaded => "load",
            Self::HostUnloaded => "unload",
        }
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub seq: u64,
    pub kind: EventKind,
    pub subject: String,
    pub host: Option<HostId>,
    pub detail: Option<String>,
}

impl LifecycleEvent {
    /// `"<kind> <subject>"`, plus `" <detail>"` when present.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{} {} {detail}", self.kind.label(), self.subject),
            None => format!("{} {}", self.kind.label(), self.subject),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "event": "lifecycle",
            "seq": self.seq,
            "kind": self.kind.label(),
            "subject": self.subject,
            "host": self.host.map(HostId::get),
            "detail": self.detail,
        })
    }
}

#[derive(Debug, Default)]
struct LogInner {
    events: RefCell<Vec<LifecycleEvent>>,
    seq: Cell<u64>,
}

/// Shared, cloneable event recorder.
#[derive(Debug, Clone, Default)]
pub struct LifecycleLog {
    inner: Rc<LogInner>,
}

impl LifecycleLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        kind: EventKind,
        subject: impl Into<String>,
        host: Option<HostId>,
        detail: Option<String>,
    ) {
        let seq = self.inner.seq.get();
        self.inner.seq.set(seq + 1);
        self.inner.events.borrow_mut().push(LifecycleEvent {
            seq,
            kind,
            subject: subject.into(),
            host,
            detail,
        });
    }

    /// Copy of every event since the last [`take`](Self::take).
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.inner.events.borrow().clone()
    }

    /// Labels of every event since the last [`take`](Self::take).
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.inner
            .events
            .borrow()
            .iter()
            .map(LifecycleEvent::label)
            .collect()
    }

    /// Labels of events of one kind.
    #[must_use]
    pub fn labels_of(&self, kind: EventKind) -> Vec<String> {
        self.inner
            .events
            .borrow()
            .iter()
            .filter(|e| e.kind == kind)
            .map(LifecycleEvent::label)
            .collect()
    }

    /// Drain and return the events. Sequence numbers keep counting.
    pub fn take(&self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut *self.inner.events.borrow_mut())
    }

    /// Drain and return the labels.
    pub fn take_labels(&self) -> Vec<String> {
        self.take().iter().map(LifecycleEvent::label).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.events.borrow().is_empty()
    }

    /// One JSON object per line, in recording order.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for event in self.inner.events.borrow().iter() {
            out.push_str(&event.to_json().to_string());
            out.push('\n');
        }
        out
    }

    /// Write [`to_jsonl`](Self::to_jsonl) to `path`.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.to_jsonl().as_bytes())
    }
}

/// Parse lifecycle JSONL back into values, skipping blank lines.
pub fn read_jsonl(path: impl AsRef<Path>) -> io::Result<Vec<Value>> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid JSONL at line {}: {err}", idx + 1),
            )
        })?;
        values.push(value);
    }
    Ok(values)
}

//! Notification output.
//!
//! Every notification is wrapped in a [`NotificationEnvelope`] and written
//! as a single JSON line, so downstream tools can consume the stream with
//! `jq` or any line-oriented reader.

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::warn;

use logwarden_core::{EventSink, Notification, NotificationEnvelope};

/// Writes notifications as JSON lines to any writer.
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

/// The daemon's production sink.
pub type StdoutSink = JsonLinesSink<io::Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, notification: Notification) {
        let envelope = NotificationEnvelope::now(notification);
        let mut out = self.out.lock();
        if let Err(e) = write_line(&mut *out, &envelope) {
            warn!(error = %e, kind = envelope.notification.kind(), "failed to write notification");
        }
    }
}

fn write_line<W: Write>(out: &mut W, envelope: &NotificationEnvelope) -> io::Result<()> {
    serde_json::to_writer(&mut *out, envelope)?;
    out.write_all(b"\n")?;
    out.flush()
}

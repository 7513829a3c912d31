//! Event sinks that receive the engine's trace

use gpusched_core::{GpuSchedError, GpuSchedResult, TraceEvent};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Append-only consumer of trace records
///
/// Errors are reported to the engine, which logs them and keeps going.
pub trait EventSink {
    fn record(&mut self, event: &TraceEvent) -> GpuSchedResult<()>;
}

/// Keeps every record in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Vec<TraceEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: &TraceEvent) -> GpuSchedResult<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _event: &TraceEvent) -> GpuSchedResult<()> {
        Ok(())
    }
}

/// Fan-out: both sinks see every record, even if the first one fails
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn record(&mut self, event: &TraceEvent) -> GpuSchedResult<()> {
        let first = self.0.record(event);
        let second = self.1.record(event);
        first.and(second)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&mut self, event: &TraceEvent) -> GpuSchedResult<()> {
        (**self).record(event)
    }
}

/// Hands records to a background writer without blocking
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TraceEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<TraceEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn record(&mut self, event: &TraceEvent) -> GpuSchedResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| GpuSchedError::Sink("trace writer has stopped".to_string()))
    }
}

/// Outcome of a background trace writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    /// Records written
    pub written: u64,
    /// Records lost to write errors
    pub failed: u64,
}

/// Open a JSONL trace file and start its background writer
///
/// Parent directories are created. The returned task finishes once every
/// [`ChannelSink`] clone has been dropped and the buffered output has been
/// flushed.
pub async fn open_jsonl_writer(
    path: &Path,
) -> GpuSchedResult<(ChannelSink, JoinHandle<WriterReport>)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let file = tokio::fs::File::create(path).await?;
    let (tx, rx) = mpsc::unbounded_channel();

    info!(path = %path.display(), "Writing trace");
    let handle = tokio::spawn(drain_to_file(rx, BufWriter::new(file), path.to_path_buf()));

    Ok((ChannelSink::new(tx), handle))
}

async fn drain_to_file<W>(
    mut rx: mpsc::UnboundedReceiver<TraceEvent>,
    mut writer: W,
    path: PathBuf,
) -> WriterReport
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut report = WriterReport::default();

    while let Some(event) = rx.recv().await {
        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, task = %event.task_id(), "Failed to encode trace record");
                report.failed += 1;
                continue;
            }
        };
        line.push(b'\n');

        match writer.write_all(&line).await {
            Ok(()) => report.written += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write trace record");
                report.failed += 1;
            }
        }
    }

    if let Err(e) = writer.flush().await {
        warn!(path = %path.display(), error = %e, "Failed to flush trace");
    }

    debug!(
        path = %path.display(),
        written = report.written,
        failed = report.failed,
        "Trace writer finished"
    );
    report
}

/// Read a JSONL trace back into memory
pub fn read_jsonl_trace(path: &Path) -> GpuSchedResult<Vec<TraceEvent>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(GpuSchedError::from))
        .collect()
}

//! Append sinks.
//!
//! A sink accepts one payload at a time. [`AppendSink::append`] starts a
//! write and returns; the sink reports completion by posting
//! [`SchedulerEvent::SinkIdle`](super::scheduler::SchedulerEvent::SinkIdle)
//! through the handle it was attached to.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use magnetcast_common::{Error, Result};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use super::scheduler::SchedulerHandle;

/// A buffered time range `[start, end]` in the sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedRange {
    pub start: f64,
    pub end: f64,
}

impl BufferedRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Ordered, single-outstanding-write destination for payloads.
pub trait AppendSink: Send {
    /// Hand the sink the scheduler it reports to. Sinks that are ready
    /// immediately post `SinkReady` here.
    fn attach(&mut self, handle: SchedulerHandle);

    /// Begin appending `payload`. The sink is busy until it posts `SinkIdle`.
    fn append(&mut self, payload: Bytes) -> Result<()>;

    /// Buffered ranges, ordered by start.
    fn buffered_ranges(&self) -> Vec<BufferedRange>;

    fn current_position(&self) -> f64;

    fn set_current_position(&mut self, position: f64);

    fn is_busy(&self) -> bool;

    fn is_ready(&self) -> bool;
}

// ---------------------------------------------------------------------------
// FileSink
// ---------------------------------------------------------------------------

/// Appends payloads to a file. Positions are byte offsets.
pub struct FileSink {
    path: PathBuf,
    file: Arc<tokio::sync::Mutex<tokio::fs::File>>,
    written: Arc<AtomicU64>,
    busy: Arc<AtomicBool>,
    position: f64,
    handle: Option<SchedulerHandle>,
}

impl FileSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(tokio::sync::Mutex::new(file)),
            written: Arc::new(AtomicU64::new(0)),
            busy: Arc::new(AtomicBool::new(false)),
            position: 0.0,
            handle: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }
}

impl AppendSink for FileSink {
    fn attach(&mut self, handle: SchedulerHandle) {
        handle.sink_ready();
        self.handle = Some(handle);
    }

    fn append(&mut self, payload: Bytes) -> Result<()> {
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| Error::sink("sink is not attached"))?;
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(Error::sink("append while a write is outstanding"));
        }

        let file = self.file.clone();
        let written = self.written.clone();
        let busy = self.busy.clone();
        let path = self.path.clone();
        tokio::spawn(async move {
            let result = async {
                let mut file = file.lock().await;
                file.write_all(&payload).await?;
                file.flush().await
            }
            .await;
            match result {
                Ok(()) => {
                    written.fetch_add(payload.len() as u64, Ordering::SeqCst);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), "Failed to append payload: {}", e);
                }
            }
            busy.store(false, Ordering::SeqCst);
            handle.sink_idle();
        });
        Ok(())
    }

    fn buffered_ranges(&self) -> Vec<BufferedRange> {
        let written = self.bytes_written();
        if written == 0 {
            return Vec::new();
        }
        vec![BufferedRange::new(0.0, written as f64)]
    }

    fn current_position(&self) -> f64 {
        self.position
    }

    fn set_current_position(&mut self, position: f64) {
        self.position = position;
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn is_ready(&self) -> bool {
        self.handle.is_some()
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    appended: Vec<Bytes>,
    ranges: Vec<BufferedRange>,
    position: f64,
    busy: bool,
    ready: bool,
    overlapping_appends: usize,
}

/// In-memory sink. Clones share state, so a caller can keep one clone to
/// inspect and drive the sink after handing another to the scheduler.
#[derive(Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    handle: Arc<Mutex<Option<SchedulerHandle>>>,
    auto_idle: bool,
}

impl MemorySink {
    /// Ready on attach, idle again as soon as each append is recorded.
    pub fn new() -> Self {
        let sink = Self::manual();
        sink.state.lock().ready = true;
        Self {
            auto_idle: true,
            ..sink
        }
    }

    /// Not ready until [`MemorySink::set_ready`], and busy after each append
    /// until [`MemorySink::finish_append`].
    pub fn manual() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            handle: Arc::new(Mutex::new(None)),
            auto_idle: false,
        }
    }

    pub fn set_ready(&self) {
        self.state.lock().ready = true;
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.sink_ready();
        }
    }

    /// Complete the outstanding append and signal idle.
    pub fn finish_append(&self) {
        self.state.lock().busy = false;
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.sink_idle();
        }
    }

    pub fn set_buffered_ranges(&self, ranges: Vec<BufferedRange>) {
        self.state.lock().ranges = ranges;
    }

    /// Force the self-reported busy flag.
    pub fn set_busy(&self, busy: bool) {
        self.state.lock().busy = busy;
    }

    pub fn appended(&self) -> Vec<Bytes> {
        self.state.lock().appended.clone()
    }

    pub fn append_count(&self) -> usize {
        self.state.lock().appended.len()
    }

    pub fn position(&self) -> f64 {
        self.state.lock().position
    }

    /// Appends received while a previous one was still outstanding.
    pub fn overlapping_appends(&self) -> usize {
        self.state.lock().overlapping_appends
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl AppendSink for MemorySink {
    fn attach(&mut self, handle: SchedulerHandle) {
        if self.state.lock().ready {
            handle.sink_ready();
        }
        *self.handle.lock() = Some(handle);
    }

    fn append(&mut self, payload: Bytes) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.ready {
                return Err(Error::sink("sink is not ready"));
            }
            if state.busy {
                state.overlapping_appends += 1;
            }
            state.busy = true;
            state.appended.push(payload);
        }
        if self.auto_idle {
            self.finish_append();
        }
        Ok(())
    }

    fn buffered_ranges(&self) -> Vec<BufferedRange> {
        self.state.lock().ranges.clone()
    }

    fn current_position(&self) -> f64 {
        self.state.lock().position
    }

    fn set_current_position(&mut self, position: f64) {
        self.state.lock().position = position;
    }

    fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    fn is_ready(&self) -> bool {
        self.state.lock().ready
    }
}

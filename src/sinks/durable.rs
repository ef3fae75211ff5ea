use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Line-oriented durable destination owned by the persistence writer
#[async_trait]
pub trait DurableSink: Send {
    /// Create the destination, discarding any previous content
    async fn create_or_truncate(&mut self) -> Result<()>;

    async fn append_line(&mut self, line: &str) -> Result<()>;

    async fn flush(&mut self) -> Result<()>;

    /// Flush and release the destination. Further writes fail.
    async fn close(&mut self) -> Result<()>;
}

/// Buffered text file
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<fs::File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<fs::File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| anyhow!("File sink {:?} is not open", self.path))
    }
}

#[async_trait]
impl DurableSink for FileSink {
    async fn create_or_truncate(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context(format!("Failed to create directory {:?}", parent))?;
            }
        }

        let file = fs::File::create(&self.path)
            .await
            .context(format!("Failed to create {:?}", self.path))?;
        self.writer = Some(BufWriter::new(file));
        debug!("opened file sink {:?}", self.path);
        Ok(())
    }

    async fn append_line(&mut self, line: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer()?.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer
                .into_inner()
                .sync_all()
                .await
                .context(format!("Failed to sync {:?}", self.path))?;
            debug!("closed file sink {:?}", self.path);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    lines: Vec<String>,
    /// Number of lines covered by the last flush
    flushed_lines: usize,
    flushes: u64,
    open: bool,
    closed: bool,
    fail_on_open: bool,
    fail_after_lines: Option<usize>,
}

/// In-memory sink; inspect it through a [`MemorySinkHandle`]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

/// Read side of a [`MemorySink`], usable after the sink moved into a writer
#[derive(Clone)]
pub struct MemorySinkHandle {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> (Self, MemorySinkHandle) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        (
            Self {
                state: state.clone(),
            },
            MemorySinkHandle { state },
        )
    }

    /// A sink whose destination cannot be created
    pub fn unavailable() -> (Self, MemorySinkHandle) {
        let (sink, handle) = Self::new();
        lock(&sink.state).fail_on_open = true;
        (sink, handle)
    }

    /// A sink that rejects appends once `lines` lines have been written
    pub fn failing_after(lines: usize) -> (Self, MemorySinkHandle) {
        let (sink, handle) = Self::new();
        lock(&sink.state).fail_after_lines = Some(lines);
        (sink, handle)
    }
}

#[async_trait]
impl DurableSink for MemorySink {
    async fn create_or_truncate(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_on_open {
            bail!("Destination unavailable");
        }
        state.lines.clear();
        state.flushed_lines = 0;
        state.open = true;
        state.closed = false;
        Ok(())
    }

    async fn append_line(&mut self, line: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            bail!("Memory sink is not open");
        }
        if state.fail_after_lines.is_some_and(|limit| state.lines.len() >= limit) {
            bail!("Destination full");
        }
        state.lines.push(line.to_string());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            bail!("Memory sink is not open");
        }
        state.flushed_lines = state.lines.len();
        state.flushes += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.open {
            state.flushed_lines = state.lines.len();
            state.open = false;
            state.closed = true;
        }
        Ok(())
    }
}

impl MemorySinkHandle {
    pub fn lines(&self) -> Vec<String> {
        lock(&self.state).lines.clone()
    }

    pub fn flushed_lines(&self) -> usize {
        lock(&self.state).flushed_lines
    }

    pub fn flushes(&self) -> u64 {
        lock(&self.state).flushes
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

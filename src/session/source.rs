//! Raw input sources.
//!
//! Sources are pull-based: [`RawSource::next`] waits at most `timeout` and
//! may return nothing. Blocking device and pipe reads happen on a reader
//! thread that feeds a channel, so `next` itself never blocks longer than
//! asked. Dropping a source kills any child process it spawned; a reader
//! thread stuck in a read is left to end with its stream.

use crate::adapters::RawInput;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Why a source stopped producing input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The stream ended
    #[error("source '{name}' closed")]
    Closed {
        /// Source name
        name: String,
    },
    /// Reading failed
    #[error("source '{name}' failed: {reason}")]
    Failed {
        /// Source name
        name: String,
        /// Failure description
        reason: String,
    },
}

/// A pull-based raw input source.
pub trait RawSource: Send {
    /// Name used in logs and stop reasons.
    fn name(&self) -> &str;

    /// Waits up to `timeout` for the next input. `Ok(None)` means no data yet.
    fn next(&mut self, timeout: Duration) -> Result<Option<RawInput>, SourceError>;
}

/// Message from a reader thread.
pub type SourceItem = Result<RawInput, String>;

/// Source fed through a channel.
///
/// The source reports [`SourceError::Closed`] once every sender is dropped
/// and the channel is drained.
#[derive(Debug)]
pub struct ChannelSource {
    name: String,
    items: Receiver<SourceItem>,
    failed: bool,
}

impl ChannelSource {
    /// Creates a source and the sender that feeds it.
    pub fn new(name: impl Into<String>) -> (Self, Sender<SourceItem>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                name: name.into(),
                items: rx,
                failed: false,
            },
            tx,
        )
    }
}

impl RawSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next(&mut self, timeout: Duration) -> Result<Option<RawInput>, SourceError> {
        if self.failed {
            return Err(SourceError::Closed {
                name: self.name.clone(),
            });
        }
        match self.items.recv_timeout(timeout) {
            Ok(Ok(input)) => Ok(Some(input)),
            Ok(Err(reason)) => {
                self.failed = true;
                Err(SourceError::Failed {
                    name: self.name.clone(),
                    reason,
                })
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Closed {
                name: self.name.clone(),
            }),
        }
    }
}

/// Line-oriented text source (a pipe, a file or a child process's stdout).
#[derive(Debug)]
pub struct LineSource {
    inner: ChannelSource,
    child: Option<Child>,
}

impl LineSource {
    /// Reads lines from any reader on a background thread.
    pub fn from_reader<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let (inner, tx) = ChannelSource::new(name);
        spawn_line_reader(inner.name.clone(), reader, tx);
        Self { inner, child: None }
    }

    /// Reads lines from standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader("stdin", std::io::stdin())
    }

    /// Spawns a shell command and reads its standard output.
    pub fn spawn_command(command_line: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context(format!("Failed to start '{command_line}'"))?;

        let stdout = child
            .stdout
            .take()
            .context("Child process has no stdout")?;

        let (inner, tx) = ChannelSource::new(command_line);
        spawn_line_reader(command_line.to_string(), stdout, tx);
        tracing::info!("Started text source '{command_line}' (pid {})", child.id());
        Ok(Self {
            inner,
            child: Some(child),
        })
    }
}

fn spawn_line_reader<R>(name: String, reader: R, tx: Sender<SourceItem>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    // Invalid UTF-8 is the adapter's problem, not a dead source
                    let line = String::from_utf8_lossy(&buffer);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(Ok(RawInput::Line(line))).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => {
                    let _ = tx.send(Err(format!("read error: {err}")));
                    break;
                }
            }
        }
        tracing::debug!("Reader for '{name}' finished");
    });
}

impl RawSource for LineSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn next(&mut self, timeout: Duration) -> Result<Option<RawInput>, SourceError> {
        self.inner.next(timeout)
    }
}

impl Drop for LineSource {
    fn drop(&mut self) {
        if let Some(child) = &mut self.child {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!("Stopped text source '{}'", self.inner.name);
        }
    }
}

/// Fixed-length binary report source (an HID device node or a capture file).
#[derive(Debug)]
pub struct ReportSource {
    inner: ChannelSource,
}

impl ReportSource {
    /// Opens `path` and reads `report_length`-byte reports from it.
    pub fn open(path: &Path, report_length: usize) -> anyhow::Result<Self> {
        use anyhow::Context;

        let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
        let name = path.display().to_string();
        tracing::info!("Reading {report_length}-byte reports from {name}");
        Ok(Self::from_reader(name, file, report_length))
    }

    /// Reads reports from any reader on a background thread.
    pub fn from_reader<R>(name: impl Into<String>, mut reader: R, report_length: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        let (inner, tx) = ChannelSource::new(name);
        let channel = inner.name.clone();
        thread::spawn(move || {
            let mut buffer = vec![0u8; report_length.max(1)];
            loop {
                match reader.read_exact(&mut buffer) {
                    Ok(()) => {
                        let input = RawInput::Report {
                            channel: channel.clone(),
                            data: buffer.clone(),
                        };
                        if tx.send(Ok(input)).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(err) => {
                        let _ = tx.send(Err(format!("read error: {err}")));
                        break;
                    }
                }
            }
            tracing::debug!("Report reader for '{channel}' finished");
        });
        Self { inner }
    }
}

impl RawSource for ReportSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn next(&mut self, timeout: Duration) -> Result<Option<RawInput>, SourceError> {
        self.inner.next(timeout)
    }
}

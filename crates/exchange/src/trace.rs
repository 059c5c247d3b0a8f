//! Per-request trace log.
//!
//! Every frame carrying a trace id is appended as one tab-separated line:
//!
//! ```text
//! trace_id  node  peer  unix_nanos  rfc3339  event  details
//! ```
//!
//! Lines are written by a background task into `<dir>/<unix_nanos>.trace.log`,
//! flushed on a fixed interval and rolled over into a new file once the
//! current one passes the size cap. The log is an explicit value shared
//! through `Arc`; a disabled log drops every record.

#[cfg(test)]
#[path = "tests/trace.rs"]
mod tests;

use core::fmt::{self, Display};
use core::time::Duration;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use eyre::{Result as EyreResult, WrapErr};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use trove_network_primitives::messages::Message;

use crate::config::TraceConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    /// We sent a wantlist.
    ClientStart,
    /// A wantlist arrived from a peer.
    ServerStart,
    /// A reply to one of our wantlists arrived.
    ClientEnd,
    /// We sent a reply frame.
    ServerEnd,
}

impl TraceEvent {
    /// Classifies an outbound frame.
    #[must_use]
    pub fn sent(message: &Message) -> Self {
        if message.entries().is_empty() {
            Self::ServerEnd
        } else {
            Self::ClientStart
        }
    }

    /// Classifies an inbound frame.
    #[must_use]
    pub fn received(message: &Message) -> Self {
        if message.entries().is_empty() {
            Self::ClientEnd
        } else {
            Self::ServerStart
        }
    }
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::ClientStart => "BitswapClientStart",
            Self::ServerStart => "BitswapServerStart",
            Self::ClientEnd => "BitswapClientEnd",
            Self::ServerEnd => "BitswapServerEnd",
        })
    }
}

#[derive(Debug)]
enum Command {
    Line(String),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug)]
pub struct TraceLog {
    node: String,
    sender: Option<mpsc::UnboundedSender<Command>>,
}

impl TraceLog {
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            node: String::new(),
            sender: None,
        }
    }

    /// Opens the first log file and starts the writer task.
    ///
    /// Must be called from within a tokio runtime. Returns a disabled log if
    /// tracing is turned off in `config`.
    pub async fn open(config: &TraceConfig, node: impl Into<String>) -> EyreResult<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        config.validate()?;

        fs::create_dir_all(&config.dir)
            .await
            .wrap_err_with(|| format!("failed to create trace directory {}", config.dir))?;

        let file = LogFile::create(&config.dir).await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let writer = Writer {
            dir: config.dir.clone(),
            max_file_size: config.max_file_size,
            file,
        };

        drop(tokio::spawn(writer.run(receiver, config.flush_interval)));

        Ok(Self {
            node: node.into(),
            sender: Some(sender),
        })
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// A fresh correlation id: 32 lowercase hex characters.
    #[must_use]
    pub fn new_trace_id() -> String {
        hex::encode(rand::random::<[u8; 16]>())
    }

    /// Appends one line for `trace_id`. Records without a trace id are
    /// ignored.
    pub fn record(
        &self,
        trace_id: &str,
        peer: &dyn Display,
        event: TraceEvent,
        details: &dyn Display,
    ) {
        let Some(sender) = &self.sender else {
            return;
        };

        if trace_id.is_empty() {
            return;
        }

        let now = Utc::now();
        let line = format!(
            "{trace_id}\t{}\t{peer}\t{}\t{}\t{event}\t{details}\n",
            self.node,
            now.timestamp_nanos_opt().unwrap_or_default(),
            now.to_rfc3339_opts(SecondsFormat::Nanos, true),
        );

        if sender.send(Command::Line(line)).is_err() {
            debug!("trace log already shut down");
        }
    }

    /// Records a frame as it crosses the wire in either direction.
    pub fn record_message(&self, peer: &dyn Display, message: &Message, event: TraceEvent) {
        self.record(&message.trace_id, peer, event, &Summary(message));
    }

    /// Flushes buffered lines and stops the writer. Later records are
    /// dropped.
    pub async fn shutdown(&self) {
        let Some(sender) = &self.sender else {
            return;
        };

        let (ack, done) = oneshot::channel();

        if sender.send(Command::Shutdown(ack)).is_err() || done.await.is_err() {
            debug!("trace log already shut down");
        }
    }
}

/// Owned form of a frame's trace details, for recording after the frame
/// has been handed off.
pub(crate) fn summarise(message: &Message) -> String {
    Summary(message).to_string()
}

struct Summary<'a>(&'a Message);

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries={} presences={} blocks={}",
            self.0.entries().len(),
            self.0.block_presences.len(),
            self.0.payload.len(),
        )
    }
}

#[derive(Debug)]
struct LogFile {
    path: Utf8PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl LogFile {
    async fn create(dir: &Utf8Path) -> EyreResult<Self> {
        let mut nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        loop {
            let path = dir.join(format!("{nanos}.trace.log"));

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        writer: BufWriter::new(file),
                        written: 0,
                    })
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => nanos += 1,
                Err(err) => {
                    return Err(err)
                        .wrap_err_with(|| format!("failed to create trace file {path}"))
                }
            }
        }
    }
}

#[derive(Debug)]
struct Writer {
    dir: Utf8PathBuf,
    max_file_size: u64,
    file: LogFile,
}

impl Writer {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Line(line)) => self.write(&line).await,
                    Some(Command::Shutdown(ack)) => {
                        self.flush().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush().await,
            }
        }
    }

    async fn write(&mut self, line: &str) {
        if let Err(err) = self.file.writer.write_all(line.as_bytes()).await {
            warn!(path = %self.file.path, %err, "failed to write trace line");
            return;
        }

        self.file.written += line.len() as u64;

        if self.file.written >= self.max_file_size {
            self.rotate().await;
        }
    }

    async fn rotate(&mut self) {
        self.flush().await;

        match LogFile::create(&self.dir).await {
            Ok(file) => {
                debug!(old = %self.file.path, new = %file.path, "rotated trace file");
                self.file = file;
            }
            Err(err) => warn!(?err, "failed to rotate trace file"),
        }
    }

    async fn flush(&mut self) {
        if let Err(err) = self.file.writer.flush().await {
            warn!(path = %self.file.path, %err, "failed to flush trace file");
        }
    }
}

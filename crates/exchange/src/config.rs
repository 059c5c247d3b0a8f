use core::time::Duration;

use camino::Utf8PathBuf;
use eyre::{ensure, Result as EyreResult};
use serde::{Deserialize, Serialize};
use trove_network_primitives::stream::MAX_FRAME_SIZE;

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * 1_024 * 1_024;
/// Wants older than this are not re-advertised to a single peer.
pub const DEFAULT_WANT_RECENCY: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_TRACE_FILE_SIZE: u64 = 16 * 1_024 * 1_024;
pub const DEFAULT_TRACE_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ExchangeConfig {
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(
        rename = "want_recency_ms",
        with = "serde_duration",
        default = "default_want_recency"
    )]
    pub want_recency: Duration,
}

impl ExchangeConfig {
    #[must_use]
    pub const fn new(max_message_size: usize, want_recency: Duration) -> Self {
        Self {
            max_message_size,
            want_recency,
        }
    }

    /// Frames must hold at least one byte and fit the codec's limit.
    pub fn validate(&self) -> EyreResult<()> {
        ensure!(self.max_message_size > 0, "max_message_size must be non-zero");
        ensure!(
            self.max_message_size <= MAX_FRAME_SIZE,
            "max_message_size {} exceeds the {MAX_FRAME_SIZE} byte frame limit",
            self.max_message_size
        );

        Ok(())
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_WANT_RECENCY)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct TraceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_trace_dir")]
    pub dir: Utf8PathBuf,

    #[serde(default = "default_trace_file_size")]
    pub max_file_size: u64,

    #[serde(
        rename = "flush_interval_ms",
        with = "serde_duration",
        default = "default_trace_flush_interval"
    )]
    pub flush_interval: Duration,
}

impl TraceConfig {
    #[must_use]
    pub const fn new(
        enabled: bool,
        dir: Utf8PathBuf,
        max_file_size: u64,
        flush_interval: Duration,
    ) -> Self {
        Self {
            enabled,
            dir,
            max_file_size,
            flush_interval,
        }
    }

    /// An enabled trace log writing into `dir` with default limits.
    #[must_use]
    pub const fn enabled_in(dir: Utf8PathBuf) -> Self {
        Self::new(
            true,
            dir,
            DEFAULT_TRACE_FILE_SIZE,
            DEFAULT_TRACE_FLUSH_INTERVAL,
        )
    }

    pub fn validate(&self) -> EyreResult<()> {
        ensure!(
            !self.flush_interval.is_zero(),
            "trace flush_interval_ms must be non-zero"
        );

        Ok(())
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new(
            false,
            default_trace_dir(),
            DEFAULT_TRACE_FILE_SIZE,
            DEFAULT_TRACE_FLUSH_INTERVAL,
        )
    }
}

const fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

const fn default_want_recency() -> Duration {
    DEFAULT_WANT_RECENCY
}

fn default_trace_dir() -> Utf8PathBuf {
    "traces".into()
}

const fn default_trace_file_size() -> u64 {
    DEFAULT_TRACE_FILE_SIZE
}

const fn default_trace_flush_interval() -> Duration {
    DEFAULT_TRACE_FLUSH_INTERVAL
}

mod serde_duration {
    use core::time::Duration;

    use serde::{ser, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(ser::Error::custom)?;

        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

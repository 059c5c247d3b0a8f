#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;

use std::fs::{read_to_string, write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use trove_exchange::config::{ExchangeConfig, TraceConfig};

pub const CONFIG_FILE: &str = "config.toml";

/// Everything a node reads at startup.
///
/// Built once and handed out by reference; nothing in the workspace keeps
/// mutable copies of these paths or limits.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub trace: TraceConfig,

    #[serde(default)]
    pub blockstore: BlockStoreConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct BlockStoreConfig {
    /// Keeps blocks in memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,
}

impl BlockStoreConfig {
    #[must_use]
    pub const fn new(path: Option<Utf8PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        exchange: ExchangeConfig,
        trace: TraceConfig,
        blockstore: BlockStoreConfig,
    ) -> Self {
        Self {
            exchange,
            trace,
            blockstore,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration from {path:?}"))?;

        config
            .exchange
            .validate()
            .and_then(|()| config.trace.validate())
            .wrap_err_with(|| format!("invalid configuration in {path:?}"))?;

        Ok(config)
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Renders a single setting by its dotted key, as written in the file.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<String> {
        match key {
            "exchange.max_message_size" => Some(self.exchange.max_message_size.to_string()),
            "exchange.want_recency_ms" => {
                Some(self.exchange.want_recency.as_millis().to_string())
            }
            "trace.enabled" => Some(self.trace.enabled.to_string()),
            "trace.dir" => Some(self.trace.dir.to_string()),
            "trace.max_file_size" => Some(self.trace.max_file_size.to_string()),
            "trace.flush_interval_ms" => {
                Some(self.trace.flush_interval.as_millis().to_string())
            }
            "blockstore.path" => self.blockstore.path.as_ref().map(ToString::to_string),
            _ => None,
        }
    }
}

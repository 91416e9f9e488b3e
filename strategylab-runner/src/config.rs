//! Strategy and pool configuration, loaded from TOML.
//!
//! A strategy file looks like:
//!
//! ```toml
//! name = "us_momentum"
//! symbols = ["AAPL", "MSFT", "NVDA"]
//!
//! [provider]
//! kind = "yahoo_finance"
//! interval = "1d"
//!
//! [pipeline]
//! base_path = "data"
//!
//! [window]
//! train_period = 60
//! valid_period = 20
//!
//! [algorithm]
//! kind = "momentum"
//! window = 20
//!
//! [selection]
//! method = "top_n"
//! param = 2
//! ```
//!
//! Everything under `[provider]` except `kind` is handed to the provider
//! constructor untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strategylab_core::algo::AlgorithmKind;
use strategylab_core::data::{DataError, DataPipeline, PipelineConfig, ProviderRegistry};
use strategylab_core::Clock;
use thiserror::Error;

use crate::preference::TradingPreference;
use crate::selection::{SelectionMethod, SelectionPolicy};
use crate::window::MIN_PERIOD;

/// Content hash of a configuration.
pub type ConfigId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One strategy: symbols, where their data comes from, and how to rank them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub symbols: Vec<String>,
    pub provider: ProviderSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    pub window: WindowSection,
    #[serde(default)]
    pub algorithm: AlgorithmSection,
    pub selection: SelectionSection,
    /// Display names for reports, keyed by symbol.
    #[serde(default)]
    pub symbol_names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSection {
    pub kind: String,
    #[serde(flatten)]
    pub params: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub base_path: PathBuf,
    pub cache_days: u32,
    pub chunk_size: usize,
    pub lock_timeout_secs: u64,
    pub fetch_interval_secs: u64,
    pub use_file_lock: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            base_path: d.base_path,
            cache_days: d.cache_days,
            chunk_size: d.chunk_size,
            lock_timeout_secs: d.lock_timeout.as_secs(),
            fetch_interval_secs: d.fetch_interval.as_secs(),
            use_file_lock: d.use_file_lock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSection {
    pub train_period: usize,
    pub valid_period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmSection {
    pub kind: AlgorithmKind,
    pub window: usize,
}

impl Default for AlgorithmSection {
    fn default() -> Self {
        Self {
            kind: AlgorithmKind::Momentum,
            window: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionSection {
    pub method: SelectionMethod,
    pub param: f64,
    #[serde(default = "default_min_stocks")]
    pub min_stocks: usize,
    #[serde(default = "default_max_stocks")]
    pub max_stocks: usize,
}

fn default_min_stocks() -> usize {
    1
}

fn default_max_stocks() -> usize {
    10
}

impl From<SelectionSection> for SelectionPolicy {
    fn from(s: SelectionSection) -> Self {
        Self {
            method: s.method,
            param: s.param,
            min_stocks: s.min_stocks,
            max_stocks: s.max_stocks,
        }
    }
}

impl StrategyConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(format!("strategy '{}': {msg}", self.name)))
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy name is empty".into()));
        }
        if self.symbols.is_empty() {
            return invalid("no symbols".into());
        }
        let mut seen = BTreeSet::new();
        for s in &self.symbols {
            if s.trim().is_empty() {
                return invalid("empty symbol".into());
            }
            if !seen.insert(s.as_str()) {
                return invalid(format!("duplicate symbol '{s}'"));
            }
        }
        if self.provider.kind.trim().is_empty() {
            return invalid("provider kind is empty".into());
        }
        if self.pipeline.chunk_size == 0 {
            return invalid("chunk_size must be >= 1".into());
        }
        let w = &self.window;
        if w.train_period < MIN_PERIOD || w.valid_period < MIN_PERIOD {
            return invalid(format!(
                "train_period ({}) and valid_period ({}) must be >= {MIN_PERIOD} business days",
                w.train_period, w.valid_period
            ));
        }
        if self.algorithm.window == 0 {
            return invalid("algorithm window must be >= 1".into());
        }
        let sel = &self.selection;
        if sel.max_stocks == 0 {
            return invalid("max_stocks must be >= 1".into());
        }
        if sel.min_stocks > sel.max_stocks {
            return invalid(format!(
                "min_stocks ({}) exceeds max_stocks ({})",
                sel.min_stocks, sel.max_stocks
            ));
        }
        if !sel.param.is_finite() || sel.param < 0.0 {
            return invalid(format!("selection param must be a non-negative number, got {}", sel.param));
        }
        Ok(())
    }

    /// Deterministic id: blake3 of the canonical JSON form.
    pub fn fingerprint(&self) -> ConfigId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    pub fn pipeline_config(&self, clock: Clock) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            base_path: p.base_path.clone(),
            cache_days: p.cache_days,
            chunk_size: p.chunk_size,
            lock_timeout: Duration::from_secs(p.lock_timeout_secs),
            fetch_interval: Duration::from_secs(p.fetch_interval_secs),
            use_file_lock: p.use_file_lock,
            clock,
        }
    }

    /// One fetching pipeline per symbol, providers built through `registry`.
    pub fn build_pipelines(&self, registry: &ProviderRegistry, clock: Clock) -> Result<Vec<DataPipeline>, DataError> {
        self.symbols
            .iter()
            .map(|symbol| {
                let provider = registry.build(&self.provider.kind, symbol, &self.provider.params)?;
                DataPipeline::new(provider, self.pipeline_config(clock.clone()))
            })
            .collect()
    }

    /// One cache-only pipeline per symbol.
    pub fn read_only_pipelines(&self, clock: Clock) -> Result<Vec<DataPipeline>, DataError> {
        self.symbols
            .iter()
            .map(|symbol| DataPipeline::read_only(symbol.clone(), self.pipeline_config(clock.clone())))
            .collect()
    }
}

/// A set of strategies run together for one execution date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub preference: TradingPreference,
    /// Strategy files; relative paths resolve against the pool file's directory.
    pub strategies: Vec<PathBuf>,
    #[serde(default)]
    pub parallel: bool,
}

impl PoolConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.strategies.is_empty() {
            return Err(ConfigError::Invalid(format!("pool {} lists no strategies", path.display())));
        }
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        for p in &mut config.strategies {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        }
        Ok(config)
    }

    pub fn load_strategies(&self) -> Result<Vec<StrategyConfig>, ConfigError> {
        self.strategies.iter().map(|p| StrategyConfig::from_file(p)).collect()
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

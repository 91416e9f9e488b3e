//! StrategyLab Runner — strategies, selection, metrics, and the strategy pool.
//!
//! This crate builds on `strategylab-core` to provide:
//! - TOML strategy and pool configuration with validation and fingerprints
//! - Train/validation windows in business days
//! - Selection policies (top-n, threshold, relative)
//! - Performance metrics over the validation window
//! - The strategy state machine and the preference-driven pool
//! - Percentage-formatted reports

pub mod config;
pub mod metrics;
pub mod pool;
pub mod preference;
pub mod report;
pub mod selection;
pub mod strategy;
pub mod window;

pub use config::{ConfigError, PoolConfig, StrategyConfig};
pub use metrics::PerformanceMetrics;
pub use pool::{pick_best, PoolOutcome, StrategyPool};
pub use preference::TradingPreference;
pub use report::PortfolioReport;
pub use selection::{SelectionMethod, SelectionPolicy};
pub use strategy::{PortfolioResult, RankingStrategy, Strategy, StrategyError, StrategyState};
pub use window::{StrategyWindow, WindowError};

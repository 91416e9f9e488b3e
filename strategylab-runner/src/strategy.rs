//! Strategies: turn cached prices into a selected basket for one date.
//!
//! A [`RankingStrategy`] runs the chain
//!
//! ```text
//! Idle → PanelAssembled → WindowComputed → ScoresComputed
//!      → StocksSelected → PerformanceComputed → Done
//! ```
//!
//! and drops into `Error` from whichever step fails. The window is only ever
//! recomputed by an explicit [`RankingStrategy::recompute`] call.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strategylab_core::algo::{AlgoError, Scores, ScoringAlgorithm};
use strategylab_core::data::{DataError, DataPipeline, ProviderRegistry};
use strategylab_core::domain::{PanelError, PricePanel};
use strategylab_core::Clock;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, StrategyConfig};
use crate::metrics::{basket_returns, PerformanceMetrics};
use crate::selection::SelectionPolicy;
use crate::window::{check_periods, StrategyWindow, WindowError};

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Algo(#[from] AlgoError),

    #[error("strategy has no pipelines")]
    NoPipelines,

    #[error("no dates are shared by all symbols")]
    EmptyPanel,

    #[error("window not computed; call recompute first")]
    WindowNotComputed,

    #[error("{what} window holds {rows} rows, need at least {needed}")]
    InsufficientData {
        what: &'static str,
        rows: usize,
        needed: usize,
    },

    #[error("selection picked no symbols")]
    NoSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyState {
    Idle,
    PanelAssembled,
    WindowComputed,
    ScoresComputed,
    StocksSelected,
    PerformanceComputed,
    Done,
    Error(String),
}

/// What one strategy proposes for one execution date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub strategy_name: String,
    pub strategy_id: String,
    pub execute_date: NaiveDate,
    pub window: StrategyWindow,
    /// Highest score first.
    pub selected_stocks: Vec<String>,
    pub weights: Vec<(String, f64)>,
    /// Scores of the selected symbols, same order.
    pub scores: Vec<(String, f64)>,
    pub performance: PerformanceMetrics,
}

/// Common interface the pool runs against.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Stable identifier, derived from the strategy's configuration.
    fn id(&self) -> &str;

    fn state(&self) -> &StrategyState;

    fn try_execute(&mut self, execute_date: NaiveDate) -> Result<PortfolioResult, StrategyError>;

    /// Like [`Strategy::try_execute`], but failures are logged and become `None`.
    fn execute(&mut self, execute_date: NaiveDate) -> Option<PortfolioResult> {
        match self.try_execute(execute_date) {
            Ok(result) => Some(result),
            Err(e) => {
                error!(strategy = %self.name(), date = %execute_date, error = %e, "strategy execution failed");
                None
            }
        }
    }
}

/// Scores every symbol over the training window, picks a basket, and
/// measures it over the validation window.
pub struct RankingStrategy {
    name: String,
    id: String,
    pipelines: Vec<DataPipeline>,
    algorithm: Box<dyn ScoringAlgorithm>,
    selection: SelectionPolicy,
    train_period: usize,
    valid_period: usize,
    refresh: bool,
    panel: Option<PricePanel>,
    window: Option<StrategyWindow>,
    state: StrategyState,
}

impl RankingStrategy {
    pub fn new(
        name: impl Into<String>,
        pipelines: Vec<DataPipeline>,
        algorithm: Box<dyn ScoringAlgorithm>,
        selection: SelectionPolicy,
        train_period: usize,
        valid_period: usize,
    ) -> Result<Self, StrategyError> {
        if pipelines.is_empty() {
            return Err(StrategyError::NoPipelines);
        }
        let name = name.into();
        let symbols: Vec<&str> = pipelines.iter().map(|p| p.symbol()).collect();
        let descriptor = json!({
            "name": name,
            "symbols": symbols,
            "algorithm": algorithm.params(),
            "selection": selection,
            "train_period": train_period,
            "valid_period": valid_period,
        });
        let id = blake3::hash(descriptor.to_string().as_bytes()).to_hex().to_string();

        Ok(Self {
            name,
            id,
            pipelines,
            algorithm,
            selection,
            train_period,
            valid_period,
            refresh: true,
            panel: None,
            window: None,
            state: StrategyState::Idle,
        })
    }

    /// Validates `config`, builds its pipelines through `registry`, and takes
    /// the config fingerprint as the strategy id.
    pub fn from_config(config: &StrategyConfig, registry: &ProviderRegistry, clock: Clock) -> Result<Self, StrategyError> {
        config.validate()?;
        let pipelines = config.build_pipelines(registry, clock)?;
        let algorithm = config.algorithm.kind.build(config.algorithm.window)?;
        let mut strategy = Self::new(
            config.name.clone(),
            pipelines,
            algorithm,
            config.selection.into(),
            config.window.train_period,
            config.window.valid_period,
        )?;
        strategy.id = config.fingerprint();
        Ok(strategy)
    }

    /// Whether panel assembly first brings every pipeline up to date.
    /// On by default; turn off to score the cache as it stands.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Use an already assembled panel instead of reading the pipelines.
    pub fn with_panel(mut self, panel: PricePanel) -> Self {
        self.panel = Some(panel);
        self
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.symbol()).collect()
    }

    pub fn pipelines(&self) -> &[DataPipeline] {
        &self.pipelines
    }

    pub fn algorithm(&self) -> &dyn ScoringAlgorithm {
        self.algorithm.as_ref()
    }

    pub fn selection(&self) -> &SelectionPolicy {
        &self.selection
    }

    pub fn panel(&self) -> Option<&PricePanel> {
        self.panel.as_ref()
    }

    pub fn window(&self) -> Option<&StrategyWindow> {
        self.window.as_ref()
    }

    /// Refresh the pipelines (if enabled), then inner-join their closes.
    pub fn assemble_panel(&mut self) -> Result<&PricePanel, StrategyError> {
        let mut series = Vec::with_capacity(self.pipelines.len());
        for pipeline in &mut self.pipelines {
            if self.refresh {
                pipeline.update_to_latest()?;
            }
            let rows = pipeline.get_all_data()?;
            debug!(symbol = %pipeline.symbol(), rows = rows.len(), "loaded cached rows");
            series.push((pipeline.symbol().to_string(), rows));
        }

        let panel = PricePanel::inner_join(series)?;
        if panel.is_empty() {
            return Err(StrategyError::EmptyPanel);
        }
        info!(
            strategy = %self.name,
            rows = panel.n_rows(),
            symbols = panel.n_cols(),
            "panel assembled"
        );
        self.state = StrategyState::PanelAssembled;
        Ok(self.panel.insert(panel))
    }

    /// Recompute the train/validation window for `execute_date`.
    pub fn recompute(&mut self, execute_date: NaiveDate) -> Result<StrategyWindow, StrategyError> {
        let window = StrategyWindow::compute(execute_date, self.train_period, self.valid_period)?;
        self.window = Some(window);
        self.state = StrategyState::WindowComputed;
        Ok(window)
    }

    /// Algorithm scores over the training window, in panel column order.
    pub fn score(&self) -> Result<Scores, StrategyError> {
        let (panel, window) = self.ready()?;
        let train = panel.slice(window.train_start, window.train_end);
        if train.is_empty() {
            return Err(StrategyError::InsufficientData {
                what: "training",
                rows: 0,
                needed: 1,
            });
        }
        Ok(self.algorithm.predict(&train)?)
    }

    pub fn select_stocks(&self, scores: &Scores) -> Vec<String> {
        self.selection.select(scores)
    }

    /// Equal-weight performance of `selected` over the validation window.
    pub fn calculate_performance(&self, selected: &[String]) -> Result<PerformanceMetrics, StrategyError> {
        let (panel, window) = self.ready()?;
        let valid = panel.slice(window.valid_start, window.valid_end).select(selected)?;
        if valid.n_rows() < 2 {
            return Err(StrategyError::InsufficientData {
                what: "validation",
                rows: valid.n_rows(),
                needed: 2,
            });
        }
        Ok(PerformanceMetrics::compute(&basket_returns(&valid)))
    }

    fn ready(&self) -> Result<(&PricePanel, &StrategyWindow), StrategyError> {
        let panel = self.panel.as_ref().ok_or(StrategyError::EmptyPanel)?;
        let window = self.window.as_ref().ok_or(StrategyError::WindowNotComputed)?;
        Ok((panel, window))
    }

    fn run(&mut self, execute_date: NaiveDate) -> Result<PortfolioResult, StrategyError> {
        // bad periods fail before any pipeline is refreshed
        check_periods(self.train_period, self.valid_period)?;
        if self.panel.is_none() {
            self.assemble_panel()?;
        }
        let window = self.recompute(execute_date)?;
        if let Some(last) = self.panel.as_ref().and_then(PricePanel::last_date) {
            if last < window.valid_end {
                warn!(strategy = %self.name, last = %last, valid_end = %window.valid_end, "panel ends before validation window");
            }
        }

        let scores = self.score()?;
        self.state = StrategyState::ScoresComputed;

        let selected = self.select_stocks(&scores);
        if selected.is_empty() {
            return Err(StrategyError::NoSelection);
        }
        self.state = StrategyState::StocksSelected;

        let performance = self.calculate_performance(&selected)?;
        self.state = StrategyState::PerformanceComputed;

        let weight = 1.0 / selected.len() as f64;
        let selected_scores = selected
            .iter()
            .filter_map(|s| scores.iter().find(|(sym, _)| sym == s).cloned())
            .collect();
        let result = PortfolioResult {
            strategy_name: self.name.clone(),
            strategy_id: self.id.clone(),
            execute_date,
            window,
            weights: selected.iter().map(|s| (s.clone(), weight)).collect(),
            scores: selected_scores,
            selected_stocks: selected,
            performance,
        };
        info!(
            strategy = %self.name,
            date = %execute_date,
            selected = ?result.selected_stocks,
            cumulative_return = result.performance.cumulative_return,
            sharpe = result.performance.sharpe_ratio,
            "strategy executed"
        );
        self.state = StrategyState::Done;
        Ok(result)
    }
}

impl Strategy for RankingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn try_execute(&mut self, execute_date: NaiveDate) -> Result<PortfolioResult, StrategyError> {
        self.run(execute_date).map_err(|e| {
            self.state = StrategyState::Error(e.to_string());
            e
        })
    }
}

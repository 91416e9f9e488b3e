//! Provider registry: maps a configured provider `kind` to a constructor.
//!
//! The registry is an ordinary value handed to whoever builds pipelines; there
//! is no global table. Construction is the one place provider errors surface:
//! an unknown kind or a missing/ill-typed parameter fails here instead of
//! silently producing a provider that never returns data.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;

use super::circuit_breaker::CircuitBreaker;
use super::csv_provider::CsvFileProvider;
use super::provider::{DataError, DataProvider, FetchWindow};
use super::synthetic::{SyntheticProvider, WalkParams};
use super::twelve_data::TwelveDataProvider;
use super::yahoo::YahooProvider;

/// Everything a constructor gets to build one provider.
pub struct ProviderContext<'a> {
    pub symbol: &'a str,
    pub params: &'a toml::Table,
    pub circuit_breaker: Arc<CircuitBreaker>,
}

impl ProviderContext<'_> {
    pub fn str_param(&self, key: &str) -> Result<Option<String>, DataError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong_type(key, "a string", other)),
        }
    }

    pub fn f64_param(&self, key: &str) -> Result<Option<f64>, DataError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Float(f)) => Ok(Some(*f)),
            Some(toml::Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(self.wrong_type(key, "a number", other)),
        }
    }

    /// Dates may be written as TOML dates (`2024-01-02`) or strings.
    pub fn date_param(&self, key: &str) -> Result<Option<NaiveDate>, DataError> {
        let raw = match self.params.get(key) {
            None => return Ok(None),
            Some(toml::Value::Datetime(dt)) => dt.to_string(),
            Some(toml::Value::String(s)) => s.clone(),
            Some(other) => return Err(self.wrong_type(key, "a date", other)),
        };
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| DataError::InvalidConfig(format!("`{key}` = '{raw}' is not a YYYY-MM-DD date: {e}")))
    }

    pub fn timezone_param(&self, key: &str) -> Result<Option<Tz>, DataError> {
        self.str_param(key)?
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| DataError::InvalidConfig(format!("`{key}` = '{name}' is not an IANA timezone")))
            })
            .transpose()
    }

    pub fn window(&self) -> Result<FetchWindow, DataError> {
        Ok(FetchWindow::new(self.date_param("start_date")?, self.date_param("end_date")?))
    }

    fn wrong_type(&self, key: &str, expected: &str, got: &toml::Value) -> DataError {
        DataError::InvalidConfig(format!(
            "provider parameter `{key}` must be {expected}, got {}",
            got.type_str()
        ))
    }
}

pub type ProviderFactory = fn(&ProviderContext<'_>) -> Result<Box<dyn DataProvider>, DataError>;

pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl ProviderRegistry {
    /// An empty registry sharing one circuit breaker across its providers.
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            factories: BTreeMap::new(),
            circuit_breaker,
        }
    }

    /// Registry with the built-in kinds: `yahoo_finance`, `twelve_data`,
    /// `csv_file` and `synthetic`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(Arc::new(CircuitBreaker::default_provider()));
        registry.register("yahoo_finance", build_yahoo);
        registry.register("twelve_data", build_twelve_data);
        registry.register("csv_file", build_csv_file);
        registry.register("synthetic", build_synthetic);
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(&self, kind: &str, symbol: &str, params: &toml::Table) -> Result<Box<dyn DataProvider>, DataError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| DataError::UnknownProvider(kind.to_string()))?;
        factory(&ProviderContext {
            symbol,
            params,
            circuit_breaker: Arc::clone(&self.circuit_breaker),
        })
    }
}

fn build_yahoo(ctx: &ProviderContext<'_>) -> Result<Box<dyn DataProvider>, DataError> {
    let provider = YahooProvider::new(
        ctx.symbol,
        ctx.str_param("interval")?.unwrap_or_else(|| "1d".into()),
        ctx.str_param("range")?.unwrap_or_else(|| "max".into()),
        ctx.window()?,
        Arc::clone(&ctx.circuit_breaker),
    )?;
    Ok(Box::new(provider))
}

fn build_twelve_data(ctx: &ProviderContext<'_>) -> Result<Box<dyn DataProvider>, DataError> {
    let mut provider = TwelveDataProvider::new(
        ctx.symbol,
        ctx.str_param("api_key")?,
        ctx.str_param("interval")?.unwrap_or_else(|| "1day".into()),
        ctx.window()?,
        Arc::clone(&ctx.circuit_breaker),
    )?
    .with_exchange(ctx.str_param("exchange")?);
    if let Some(country) = ctx.str_param("country")? {
        provider = provider.with_country(country);
    }
    if let Some(asset_type) = ctx.str_param("type")? {
        provider = provider.with_asset_type(asset_type);
    }
    Ok(Box::new(provider))
}

/// `path` may contain `{symbol}`, e.g. `data/raw/{symbol}.csv`.
fn build_csv_file(ctx: &ProviderContext<'_>) -> Result<Box<dyn DataProvider>, DataError> {
    let template = ctx
        .str_param("path")?
        .ok_or_else(|| DataError::InvalidConfig("csv_file requires `path`".into()))?;
    let path = PathBuf::from(template.replace("{symbol}", ctx.symbol));
    let timezone = ctx.timezone_param("timezone")?.unwrap_or(Tz::UTC);
    Ok(Box::new(CsvFileProvider::new(ctx.symbol, path, timezone, ctx.window()?)))
}

fn build_synthetic(ctx: &ProviderContext<'_>) -> Result<Box<dyn DataProvider>, DataError> {
    let defaults = WalkParams::default();
    let params = WalkParams {
        start_price: ctx.f64_param("start_price")?.unwrap_or(defaults.start_price),
        drift: ctx.f64_param("drift")?.unwrap_or(defaults.drift),
        volatility: ctx.f64_param("volatility")?.unwrap_or(defaults.volatility),
    };
    if params.volatility < 0.0 || !params.volatility.is_finite() {
        return Err(DataError::InvalidConfig(format!(
            "synthetic `volatility` must be a non-negative number, got {}",
            params.volatility
        )));
    }
    let origin = match ctx.date_param("origin")? {
        Some(d) => d,
        None => NaiveDate::from_ymd_opt(2020, 1, 1)
            .ok_or_else(|| DataError::InvalidConfig("invalid default origin".into()))?,
    };
    let mut provider = SyntheticProvider::new(ctx.symbol, params, origin, ctx.window()?);
    if let Some(horizon) = ctx.date_param("horizon")? {
        provider = provider.with_horizon(horizon);
    }
    Ok(Box::new(provider))
}

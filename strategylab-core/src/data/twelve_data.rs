//! Twelve Data provider.
//!
//! The time-series endpoint returns prices as numeric strings and datetimes
//! as naive wall-clock values in the exchange's timezone, which is named in
//! the response metadata. Rows are localized there and converted to UTC.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, FetchWindow};
use crate::domain::PriceRow;

const API_ADDRESS: &str = "https://api.twelvedata.com/time_series";

/// Environment variable consulted when no `api_key` is configured.
pub const API_KEY_ENV: &str = "TWELVE_DATA_API_KEY";

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    values: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    exchange_timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Value {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}

/// Twelve Data provider for one symbol.
pub struct TwelveDataProvider {
    symbol: String,
    api_key: String,
    interval: String,
    country: String,
    exchange: Option<String>,
    asset_type: String,
    window: FetchWindow,
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl TwelveDataProvider {
    /// Falls back to [`API_KEY_ENV`] when `api_key` is `None`; a missing key is
    /// a configuration error.
    pub fn new(
        symbol: impl Into<String>,
        api_key: Option<String>,
        interval: impl Into<String>,
        window: FetchWindow,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let api_key = api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DataError::InvalidConfig(format!(
                    "twelve_data requires `api_key` or the {API_KEY_ENV} environment variable"
                ))
            })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            symbol: symbol.into(),
            api_key,
            interval: interval.into(),
            country: "US".into(),
            exchange: None,
            asset_type: "stock".into(),
            window,
            client,
            circuit_breaker,
        })
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_exchange(mut self, exchange: Option<String>) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = asset_type.into();
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("apikey", self.api_key.clone()),
            ("symbol", self.symbol.clone()),
            ("interval", self.interval.clone()),
            ("country", self.country.clone()),
            ("type", self.asset_type.clone()),
        ];
        if let Some(start) = self.window.start {
            params.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.window.end {
            params.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        if let Some(exchange) = &self.exchange {
            params.push(("exchange", exchange.clone()));
        }
        params
    }

    fn parse_response(symbol: &str, resp: TimeSeriesResponse) -> Result<Vec<PriceRow>, DataError> {
        if resp.status.as_deref() == Some("error") {
            let message = resp.message.unwrap_or_default();
            return Err(match resp.code {
                Some(401) | Some(403) => DataError::AuthenticationRequired(message),
                Some(429) => DataError::RateLimited {
                    retry_after_secs: 60,
                },
                Some(400) | Some(404) => DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                },
                _ => DataError::ResponseFormatChanged(message),
            });
        }

        let values = resp
            .values
            .ok_or_else(|| DataError::ResponseFormatChanged("response has no `values`".into()))?;

        let tz: Tz = match resp.meta.and_then(|m| m.exchange_timezone) {
            Some(name) => name.parse().map_err(|_| {
                DataError::ResponseFormatChanged(format!("unknown exchange timezone '{name}'"))
            })?,
            None => Tz::UTC,
        };

        let mut rows = Vec::with_capacity(values.len());
        for v in values {
            let naive = parse_naive_datetime(&v.datetime).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("unparseable datetime '{}'", v.datetime))
            })?;
            // Wall-clock times inside a DST gap do not exist; skip them.
            let Some(local) = tz.from_local_datetime(&naive).earliest() else {
                warn!(symbol, datetime = %v.datetime, timezone = %tz, "nonexistent local time, skipping row");
                continue;
            };

            rows.push(PriceRow {
                timestamp: local.with_timezone(&Utc),
                open: parse_number(&v.open),
                high: parse_number(&v.high),
                low: parse_number(&v.low),
                close: parse_number(&v.close),
                volume: v.volume.as_deref().map(parse_number).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (intraday) and `YYYY-MM-DD` (daily bars).
pub(crate) fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// Unparseable numbers become NaN rather than failing the whole batch.
fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

impl DataProvider for TwelveDataProvider {
    fn name(&self) -> &str {
        "twelve_data"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn window(&self) -> &FetchWindow {
        &self.window
    }

    fn window_mut(&mut self) -> &mut FetchWindow {
        &mut self.window
    }

    fn fetch(&self) -> Result<Vec<PriceRow>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let resp = self
            .client
            .get(API_ADDRESS)
            .query(&self.query())
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::Other(format!("HTTP {status} for {}", self.symbol)));
        }

        let body: TimeSeriesResponse = resp
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(e.to_string()))?;

        let result = Self::parse_response(&self.symbol, body);
        match &result {
            Err(DataError::RateLimited { .. }) => self.circuit_breaker.record_failure(),
            Ok(_) => self.circuit_breaker.record_success(),
            Err(_) => {}
        }
        result
    }

    fn ping(&self) -> bool {
        self.circuit_breaker.is_allowed()
            && self
                .client
                .get("https://api.twelvedata.com/quote")
                .query(&[("symbol", self.symbol.as_str()), ("apikey", self.api_key.as_str())])
                .send()
                .map(|r| r.status().is_success())
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn parse(json: &str) -> Result<Vec<PriceRow>, DataError> {
        let resp: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        TwelveDataProvider::parse_response("AAPL", resp)
    }

    #[test]
    fn localizes_exchange_time_to_utc() {
        let rows = parse(
            r#"{"meta":{"symbol":"AAPL","exchange_timezone":"America/New_York"},
            "values":[{"datetime":"2024-01-02 09:30:00","open":"187.15","high":"188.44",
            "low":"183.89","close":"185.64","volume":"82488700"}],"status":"ok"}"#,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        // EST is UTC-5 in January
        assert_eq!(rows[0].timestamp.hour(), 14);
        assert_eq!(rows[0].timestamp.minute(), 30);
        assert_eq!(rows[0].close, 185.64);
        assert_eq!(rows[0].volume, 82488700.0);
    }

    #[test]
    fn daily_dates_parse_as_midnight() {
        let rows = parse(
            r#"{"meta":{"exchange_timezone":"UTC"},
            "values":[{"datetime":"2024-01-02","open":"1","high":"2","low":"0.5","close":"1.5"}],
            "status":"ok"}"#,
        )
        .unwrap();
        assert_eq!(rows[0].timestamp.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(rows[0].volume, 0.0);
    }

    #[test]
    fn bad_number_becomes_nan() {
        let rows = parse(
            r#"{"values":[{"datetime":"2024-01-02","open":"x","high":"2","low":"1","close":"1.5"}],"status":"ok"}"#,
        )
        .unwrap();
        assert!(rows[0].open.is_nan());
        assert!(rows[0].is_void());
    }

    #[test]
    fn error_status_maps_codes() {
        let err = parse(r#"{"status":"error","code":429,"message":"too many"}"#).unwrap_err();
        assert!(matches!(err, DataError::RateLimited { .. }));
        let err = parse(r#"{"status":"error","code":401,"message":"bad key"}"#).unwrap_err();
        assert!(matches!(err, DataError::AuthenticationRequired(_)));
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let p = TwelveDataProvider::new("AAPL", Some("k".into()), "1day", FetchWindow::default(), breaker)
            .unwrap();
        assert_eq!(p.api_key, "k");
        assert!(p.query().iter().any(|(k, v)| *k == "interval" && v == "1day"));
    }
}

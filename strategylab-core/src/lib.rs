//! StrategyLab Core — price data, the chunked cache, calendar math, scoring.
//!
//! This crate contains everything below the strategy layer:
//! - Domain types (price rows, close-price panels)
//! - Business-day calendar and an injectable clock
//! - Data providers (Yahoo Finance, Twelve Data, CSV, synthetic) behind one trait
//! - Per-symbol chunked CSV store with per-file locks, and the pipeline over it
//! - Scoring algorithms (momentum, moving-average distance)

pub mod algo;
pub mod calendar;
pub mod clock;
pub mod data;
pub mod domain;

pub use clock::Clock;

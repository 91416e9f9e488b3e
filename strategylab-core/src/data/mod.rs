//! Data layer: providers, the chunked on-disk cache, and pipelines over it.

pub mod chunk_store;
pub mod circuit_breaker;
pub mod csv_provider;
pub mod lock;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod snapshot;
pub mod synthetic;
pub mod twelve_data;
pub mod yahoo;

pub use chunk_store::{AppendSummary, ChunkStore};
pub use circuit_breaker::CircuitBreaker;
pub use csv_provider::CsvFileProvider;
pub use lock::FileLock;
pub use pipeline::{DataPipeline, PipelineConfig, PipelineParams, RealtimeSummary, UpdateSummary};
pub use provider::{DataError, DataProvider, FetchWindow};
pub use registry::{ProviderContext, ProviderFactory, ProviderRegistry};
pub use snapshot::{read_panel_parquet, write_panel_parquet};
pub use synthetic::{SyntheticProvider, WalkParams};
pub use twelve_data::TwelveDataProvider;
pub use yahoo::YahooProvider;

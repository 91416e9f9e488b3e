//! Domain types for StrategyLab

pub mod panel;
pub mod price;

pub use panel::{PanelError, PricePanel};
pub use price::{dedup_keep_last, PriceRow};

/// Symbol type alias
pub type Symbol = String;

pub mod bar;
pub mod history;

// Re-export the Bar struct for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar::Bar;
pub use history::{BarSource, HistoryClient};

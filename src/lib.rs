//! Fetch CSV datasets, parse them into records and shape each one into a
//! chart configuration (line, bar, pie, scatter, radar) for a charting library.

pub mod chart;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod process;

pub use config::Config;
pub use process::{parse, parse_csv, Record};

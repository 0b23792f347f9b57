#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args, clippy::module_name_repetitions)]

//! Analysis core for tabular business data: field classification, anomaly
//! detection, insights, forecasting and chart advice, with optional remote and
//! local model backends and statistical fallbacks.

pub mod backend;
pub mod config;
pub mod dataset;
pub mod ml;
pub mod structs;

pub use backend::{MethodSelector, SelectorSession};
pub use config::{AnalysisConfig, BackendConfig, Config};
pub use ml::anomaly::detect;
pub use ml::charts::suggest;
pub use ml::classify::classify;
pub use ml::clustering::cluster;
pub use ml::forecast::forecast;
pub use ml::insights::generate;
pub use ml::pipeline::analyze;
pub use structs::*;

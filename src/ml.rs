pub mod anomaly;
pub mod charts;
pub mod classify;
pub mod clustering;
pub mod correlation;
pub mod features;
pub mod forecast;
pub mod insights;
pub mod output;
pub mod pipeline;
pub mod stats;

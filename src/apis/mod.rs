pub mod events;
pub mod stats;

pub use stats::StatsEngine;

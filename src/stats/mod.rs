//! Leaderboards aggregated from rankings and reviews.

mod engine;
pub mod models;
mod pipeline;

pub use engine::StatsEngine;
pub use models::*;
pub use pipeline::round_to;

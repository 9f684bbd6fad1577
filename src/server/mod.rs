mod admin_routes;
pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
pub(crate) mod session;
pub mod state;
mod stats_routes;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_server};

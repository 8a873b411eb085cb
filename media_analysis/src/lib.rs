mod language;
mod routes;
mod sentiment;
mod server;
mod telemetry;
mod upload;

pub mod analyzer;
pub mod app;
pub mod classifier;
pub mod config;
pub mod video;

pub use app::start_app;

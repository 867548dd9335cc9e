pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod render;

pub use app::{DashboardSnapshot, Portal};
pub use config::Config;
pub use error::ClientError;

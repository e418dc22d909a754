pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod index;
pub mod metrics;
pub mod server;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{DroveError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

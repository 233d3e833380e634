pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod resilience;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};

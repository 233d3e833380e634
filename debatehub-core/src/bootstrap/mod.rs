//! Startup wiring for the `DebateHub` server
//!
//! Loads configuration, opens the database pool and builds the
//! collaborator adapters shared by the session layer.

pub mod config;
pub mod database;
pub mod services;

pub use config::load_config;
pub use database::init_database;
pub use services::{init_services, Services};

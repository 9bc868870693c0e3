pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Settings;
pub use error::{AppError, Error, Result};
pub use services::{SettlementPipeline, SharedPipeline};

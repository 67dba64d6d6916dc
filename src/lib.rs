pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod seed;
pub mod state;

pub use error::{AppError, Result};

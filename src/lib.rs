pub mod config;
pub mod control;
pub mod data;
pub mod error;
pub mod utils;

pub use error::{LqrError, Result};

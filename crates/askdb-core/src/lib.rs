#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::{Config, Settings};
pub use error::{Error, Result};

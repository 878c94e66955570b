//! # Verdict Common Library
//!
//! Shared code for the verdict feed tools:
//! - Error type
//! - Bootstrap configuration loading (TOML file resolution)
//! - Tracing initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

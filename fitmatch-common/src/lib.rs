//! # FitMatch Common Library
//!
//! Shared code for FitMatch services including:
//! - Error and result types
//! - Bootstrap configuration loading (TOML + environment)
//! - Database bootstrap for the trainer tables
//! - Timestamp and UUID utilities

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};

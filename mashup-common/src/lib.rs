//! # Mashup Common Library
//!
//! Shared code for the mashup workspace including:
//! - Error type shared by storage and configuration
//! - Configuration loading (TOML + environment)
//! - SQLite initialisation and schema
//! - Opaque id generation

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod id_gen;

pub use error::{Error, Result};
pub use id_gen::{HashedCounterIdGenerator, IdGenerator};

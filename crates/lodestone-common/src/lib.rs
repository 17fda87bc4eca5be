//! Common utilities for lodestone
//!
//! This crate provides the error type shared by all lodestone crates.

pub mod error;

pub use error::{LodestoneError, Result};

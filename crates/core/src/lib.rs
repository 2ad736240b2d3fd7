//! Core types and utilities for the live metal-rate feed
//!
//! This crate provides shared types used across all components:
//! - Metal and purity definitions
//! - Purity-derived rate tables
//! - Market calendar and simulation factors
//! - Feed configuration and error types

pub mod types;
pub mod rates;
pub mod market;
pub mod config;
pub mod errors;

pub use types::*;
pub use rates::*;
pub use market::*;
pub use self::config::*;
pub use errors::*;

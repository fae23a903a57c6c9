//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the analytics bridge:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate holds the pieces every other crate leans on: how diagnostics
//! are emitted and forwarded to the host engine, and how the analytics
//! settings are loaded and validated before any backend is touched.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

//! Core components, types, and utilities for assistkit.
//!
//! This module contains fundamental building blocks used throughout the crate:
//! - Configuration handling and environment variables.
//! - Default instructions for created assistants.
//! - Common result types.

pub mod config;
pub mod prompts;
pub mod types;

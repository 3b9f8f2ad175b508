//! Shared utilities for the Sajiki workspace.

pub mod logger;
pub mod time;

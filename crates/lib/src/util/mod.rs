//! Shared utilities.
//!
//! Filesystem helpers used across the crate and test helpers.

pub mod fs;

#[cfg(test)]
pub mod testutil;

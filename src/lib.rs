//! Semantic analysis for a dynamic tracing language: the typed syntax tree,
//! its traversal framework and the passes that run between parsing and code
//! generation.

pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod language;
pub mod providers;

/// Field of a function's argument record holding its return value.
pub const RETVAL_FIELD: &str = "$retval";

#[cfg(test)]
mod tests;

//! Core domain models and error types for the analysis pipeline.

pub mod domain;
pub mod errors;

//! Record-level cleaning transformations applied before any merge or join.

pub mod cleaning;

pub use cleaning::{clean_annotations, clean_telemetry};

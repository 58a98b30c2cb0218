//! Parsers for the boundary tables supplied by the API layer.
//!
//! The scheduling layer fetches each table as a JSON array of records and
//! hands the raw payload to [`json_parser`], which materializes typed record
//! vectors with path-annotated parse errors.

pub mod json_parser;


pub use json_parser::{
    parse_annotations_json, parse_intervals_json, parse_production_json,
    parse_production_quality_json, parse_quality_json, parse_telemetry_json,
};

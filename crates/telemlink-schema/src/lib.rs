//! Flat wire-layout schema for telemetry frames.
//!
//! A schema is an ordered list of channels, each an ordered list of scalar
//! fields. It fixes the payload length of every frame and the order in which
//! values are unpacked from it. Type names are validated when the schema is
//! built, never at decode time.

pub mod config;
pub mod error;
pub mod primitive;
pub mod schema;
pub mod source;

pub use config::LoadOptions;
pub use error::{Result, SchemaError};
pub use primitive::PrimitiveType;
pub use schema::{Channel, Field, Schema};
pub use source::{
    from_yaml_str, load, load_with_options, materialize_template, DEFAULT_SCHEMA_FILE, TEMPLATE,
};

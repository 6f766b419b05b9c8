use std::path::PathBuf;

/// Errors that can occur while building or loading a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A field declares a type name outside the supported vocabulary.
    #[error("unknown type '{type_name}' for field {field} in channel {channel}")]
    UnknownType {
        type_name: String,
        channel: String,
        field: String,
    },

    /// The schema declares no channels.
    #[error("schema has no channels")]
    Empty,

    /// A channel declares no fields.
    #[error("channel {0} has no fields")]
    EmptyChannel(String),

    /// A schema source entry does not have the expected shape.
    #[error("invalid schema entry {index}: {message}")]
    InvalidEntry { index: usize, message: String },

    /// The schema file (or its template) could not be read or written.
    #[error("schema file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The schema source is not valid YAML.
    #[error("schema source is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

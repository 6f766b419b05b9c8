//! Loading a schema from its YAML source.
//!
//! The source is an ordered list of single-key mappings, one per channel:
//!
//! ```yaml
//! - accel:
//!     a_x: float
//!     a_y: float
//! - status:
//!     flags: uint16
//! ```
//!
//! Field order inside a channel and channel order in the list are both kept.

use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, info};

use crate::config::LoadOptions;
use crate::error::{Result, SchemaError};
use crate::schema::{Channel, Schema};

/// Schema file looked up in the working directory when none is given.
pub const DEFAULT_SCHEMA_FILE: &str = "struct_cfg.yaml";

/// Template written when the schema file does not exist yet.
pub const TEMPLATE: &str = include_str!("../templates/struct_cfg_template.yaml");

/// Parse a schema from YAML text.
pub fn from_yaml_str(source: &str) -> Result<Schema> {
    if source.trim().is_empty() {
        return Err(SchemaError::Empty);
    }
    let document: Value = serde_yaml::from_str(source)?;
    let entries = match document {
        Value::Null => return Err(SchemaError::Empty),
        Value::Sequence(entries) => entries,
        _ => {
            return Err(SchemaError::InvalidEntry {
                index: 0,
                message: "top level must be a list of channels".to_string(),
            })
        }
    };

    let channels = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_channel(index, entry))
        .collect::<Result<Vec<_>>>()?;

    Schema::new(channels)
}

/// Load a schema file with default options.
pub fn load(path: impl AsRef<Path>) -> Result<Schema> {
    load_with_options(path, &LoadOptions::default())
}

/// Load a schema file, materializing the template first if allowed and needed.
pub fn load_with_options(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Schema> {
    let path = path.as_ref();
    if options.materialize_template && !path.exists() {
        materialize_template(path)?;
    }

    let metadata = std::fs::metadata(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > options.max_file_size as u64 {
        return Err(SchemaError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "file too large ({} bytes, max {})",
                    metadata.len(),
                    options.max_file_size
                ),
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let schema = from_yaml_str(&content)?;
    debug!(
        ?path,
        channels = schema.channels().len(),
        bytes = schema.byte_size(),
        "schema loaded"
    );
    Ok(schema)
}

/// Write the built-in template to `path`.
pub fn materialize_template(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, TEMPLATE).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(?path, "schema file created from template");
    Ok(())
}

fn parse_channel(index: usize, entry: &Value) -> Result<Channel> {
    let invalid = |message: &str| SchemaError::InvalidEntry {
        index,
        message: message.to_string(),
    };

    let mapping = entry
        .as_mapping()
        .ok_or_else(|| invalid("channel entry must be a mapping"))?;
    if mapping.len() != 1 {
        return Err(invalid("channel entry must have exactly one name"));
    }
    let (name, fields) = mapping
        .iter()
        .next()
        .ok_or_else(|| invalid("channel entry must have exactly one name"))?;
    let name = scalar_to_string(name).ok_or_else(|| invalid("channel name must be a scalar"))?;
    let fields = fields
        .as_mapping()
        .ok_or_else(|| invalid("channel fields must be a mapping of name to type"))?;

    let mut declarations = Vec::with_capacity(fields.len());
    for (field_name, type_name) in fields {
        let field_name =
            scalar_to_string(field_name).ok_or_else(|| invalid("field name must be a scalar"))?;
        let type_name = type_name
            .as_str()
            .ok_or_else(|| invalid("field type must be a string"))?;
        declarations.push((field_name, type_name.to_string()));
    }

    Channel::from_declarations(Some(name), declarations)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::primitive::PrimitiveType;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "telemlink-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn parses_channels_in_declared_order() {
        let schema = from_yaml_str(
            r#"
- accel_data:
    a_x: float
    a_y: float
    a_z: float
    a: f
    b: f
- status:
    tick: uint32
    flags: uint8
"#,
        )
        .unwrap();

        assert_eq!(schema.channels().len(), 2);
        let accel = &schema.channels()[0];
        assert_eq!(accel.name(), Some("accel_data"));
        let names: Vec<_> = accel.fields().iter().filter_map(|f| f.name()).collect();
        assert_eq!(names, vec!["a_x", "a_y", "a_z", "a", "b"]);
        assert_eq!(accel.format_string(), "fffff");
        assert_eq!(schema.channels()[1].name(), Some("status"));
        assert_eq!(
            schema.channels()[1].fields()[0].primitive(),
            PrimitiveType::UInt32
        );
        assert_eq!(schema.byte_size(), 20 + 5);
    }

    #[test]
    fn mixed_aliases_resolve() {
        let schema = from_yaml_str("- t:\n    a: f\n    b: d\n    c: float\n").unwrap();
        assert_eq!(schema.channels()[0].format_string(), "fdf");
    }

    #[test]
    fn unknown_type_names_the_offending_string() {
        let err = from_yaml_str("- imu:\n    x: float\n    y: half\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { type_name, .. } if type_name == "half"));
    }

    #[test]
    fn empty_document_is_empty_schema() {
        assert!(matches!(from_yaml_str(""), Err(SchemaError::Empty)));
        assert!(matches!(from_yaml_str("[]"), Err(SchemaError::Empty)));
    }

    #[test]
    fn rejects_non_list_top_level() {
        let err = from_yaml_str("accel:\n  x: float\n").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidEntry { index: 0, .. }));
    }

    #[test]
    fn rejects_multi_name_entries() {
        let err = from_yaml_str("- a:\n    x: float\n  b:\n    y: float\n").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidEntry { index: 0, .. }));
    }

    #[test]
    fn rejects_channel_without_fields() {
        let err = from_yaml_str("- a: {}\n").unwrap_err();
        assert!(matches!(err, SchemaError::EmptyChannel(name) if name == "a"));
    }

    #[test]
    fn template_is_a_valid_schema() {
        let schema = from_yaml_str(TEMPLATE).unwrap();
        assert_eq!(schema.channels().len(), 2);
        assert_eq!(schema.byte_size(), 24);
    }

    #[test]
    fn missing_file_is_materialized_from_template() {
        let dir = unique_temp_dir("materialize");
        let path = dir.join(DEFAULT_SCHEMA_FILE);
        assert!(!path.exists());

        let schema = load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), TEMPLATE);
        assert_eq!(schema, from_yaml_str(TEMPLATE).unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_without_materialization_is_io_error() {
        let dir = unique_temp_dir("no-materialize");
        let path = dir.join("absent.yaml");
        let options = LoadOptions {
            materialize_template: false,
            ..LoadOptions::default()
        };

        let err = load_with_options(&path, &options).unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = unique_temp_dir("oversized");
        let path = dir.join("big.yaml");
        std::fs::write(&path, TEMPLATE).unwrap();
        let options = LoadOptions {
            max_file_size: 8,
            ..LoadOptions::default()
        };

        let err = load_with_options(&path, &options).unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

use std::fmt;

use crate::error::{Result, SchemaError};
use crate::primitive::PrimitiveType;

/// A single scalar field of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: Option<String>,
    primitive: PrimitiveType,
}

impl Field {
    /// Create a field with an optional name.
    pub fn new(name: Option<String>, primitive: PrimitiveType) -> Self {
        Self { name, primitive }
    }

    /// Create a named field.
    pub fn named(name: impl Into<String>, primitive: PrimitiveType) -> Self {
        Self::new(Some(name.into()), primitive)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    /// Width of this field on the wire.
    pub fn byte_size(&self) -> usize {
        self.primitive.width()
    }
}

/// A named group of fields decoded together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: Option<String>,
    fields: Vec<Field>,
}

impl Channel {
    /// Create a channel. Fails if `fields` is empty.
    pub fn new(name: Option<String>, fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(SchemaError::EmptyChannel(
                name.unwrap_or_else(|| "<unnamed>".to_string()),
            ));
        }
        Ok(Self { name, fields })
    }

    /// Build a channel from `(field name, type name)` pairs in declaration order.
    ///
    /// Every type name is checked against the supported vocabulary here, so a
    /// bad schema never reaches the decoder.
    pub fn from_declarations<N, T>(
        name: Option<String>,
        declarations: impl IntoIterator<Item = (N, T)>,
    ) -> Result<Self>
    where
        N: Into<String>,
        T: AsRef<str>,
    {
        let channel_label = name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        let mut fields = Vec::new();
        for (field_name, type_name) in declarations {
            let field_name = field_name.into();
            let type_name = type_name.as_ref();
            let primitive =
                PrimitiveType::from_name(type_name).ok_or_else(|| SchemaError::UnknownType {
                    type_name: type_name.to_string(),
                    channel: channel_label.clone(),
                    field: field_name.clone(),
                })?;
            fields.push(Field::new(Some(field_name), primitive));
        }
        Self::new(name, fields)
    }

    /// Build an unnamed channel from a struct-code string such as `"fff"`.
    pub fn from_format_string(format: &str) -> Result<Self> {
        let mut fields = Vec::with_capacity(format.len());
        for (idx, code) in format.chars().enumerate() {
            let primitive =
                PrimitiveType::from_code(code).ok_or_else(|| SchemaError::UnknownType {
                    type_name: code.to_string(),
                    channel: format.to_string(),
                    field: format!("field_{idx}"),
                })?;
            fields.push(Field::new(None, primitive));
        }
        Self::new(None, fields)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Packed byte size: the sum of every field width.
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(Field::byte_size).sum()
    }

    /// Ordered primitive sequence the record decoder unpacks.
    pub fn wire_format(&self) -> impl Iterator<Item = PrimitiveType> + '_ {
        self.fields.iter().map(Field::primitive)
    }

    /// Struct-code representation, e.g. `"fffd"`.
    pub fn format_string(&self) -> String {
        self.wire_format().map(PrimitiveType::code).collect()
    }

    /// Number of decoded values (pad fields produce none).
    pub fn value_count(&self) -> usize {
        self.wire_format().filter(|ty| ty.carries_value()).count()
    }

    /// Fields that produce a decoded value, in order.
    pub fn value_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields
            .iter()
            .filter(|field| field.primitive.carries_value())
    }
}

/// The full wire layout of one frame payload.
///
/// Channel order is the order bytes are sliced from the payload and must be
/// kept exactly as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    channels: Vec<Channel>,
}

impl Schema {
    /// Create a schema. Fails if `channels` is empty.
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        if channels.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(Self { channels })
    }

    /// Build an unnamed schema from one struct-code string per channel.
    pub fn from_format_strings<S: AsRef<str>>(formats: &[S]) -> Result<Self> {
        let channels = formats
            .iter()
            .map(|format| Channel::from_format_string(format.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(channels)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Expected payload length of every frame.
    pub fn byte_size(&self) -> usize {
        self.channels.iter().map(Channel::byte_size).sum()
    }

    /// Struct-code string per channel.
    pub fn format_strings(&self) -> Vec<String> {
        self.channels.iter().map(Channel::format_string).collect()
    }

    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|channel| channel.name() == Some(name))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema with {} bytes per frame:", self.byte_size())?;
        for (idx, channel) in self.channels.iter().enumerate() {
            write!(f, "  Channel {idx}")?;
            if let Some(name) = channel.name() {
                write!(f, " ('{name}')")?;
            }
            writeln!(
                f,
                " [{} bytes, format {}]:",
                channel.byte_size(),
                channel.format_string()
            )?;
            for (field_idx, field) in channel.fields().iter().enumerate() {
                match field.name() {
                    Some(name) => writeln!(f, "    {name}: {}", field.primitive())?,
                    None => writeln!(f, "    field_{field_idx}: {}", field.primitive())?,
                }
            }
        }
        Ok(())
    }
}

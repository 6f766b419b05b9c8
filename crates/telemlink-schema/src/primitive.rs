//! The fixed primitive-type vocabulary.
//!
//! Every wire field is one of these scalars, packed with no alignment and
//! stored in native byte order.

use std::fmt;

/// A scalar wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Bool,
    Char,
    Pad,
}

/// Accepted type names, including C aliases and single-character struct codes.
const TYPE_NAMES: &[(&str, PrimitiveType)] = &[
    ("int8", PrimitiveType::Int8),
    ("b", PrimitiveType::Int8),
    ("uint8", PrimitiveType::UInt8),
    ("B", PrimitiveType::UInt8),
    ("int16", PrimitiveType::Int16),
    ("h", PrimitiveType::Int16),
    ("uint16", PrimitiveType::UInt16),
    ("H", PrimitiveType::UInt16),
    ("int32", PrimitiveType::Int32),
    ("int", PrimitiveType::Int32),
    ("long", PrimitiveType::Int32),
    ("l", PrimitiveType::Int32),
    ("i", PrimitiveType::Int32),
    ("uint32", PrimitiveType::UInt32),
    ("uint", PrimitiveType::UInt32),
    ("ulong", PrimitiveType::UInt32),
    ("L", PrimitiveType::UInt32),
    ("I", PrimitiveType::UInt32),
    ("int64", PrimitiveType::Int64),
    ("long long", PrimitiveType::Int64),
    ("ssize_t", PrimitiveType::Int64),
    ("q", PrimitiveType::Int64),
    ("uint64", PrimitiveType::UInt64),
    ("unsigned long long", PrimitiveType::UInt64),
    ("size_t", PrimitiveType::UInt64),
    ("Q", PrimitiveType::UInt64),
    ("float", PrimitiveType::Float32),
    ("float32", PrimitiveType::Float32),
    ("f", PrimitiveType::Float32),
    ("double", PrimitiveType::Float64),
    ("float64", PrimitiveType::Float64),
    ("d", PrimitiveType::Float64),
    ("bool", PrimitiveType::Bool),
    ("_Bool", PrimitiveType::Bool),
    ("?", PrimitiveType::Bool),
    ("char", PrimitiveType::Char),
    ("c", PrimitiveType::Char),
    ("pad", PrimitiveType::Pad),
    ("NULL", PrimitiveType::Pad),
    ("x", PrimitiveType::Pad),
];

impl PrimitiveType {
    /// Look up a declared type name. Returns `None` for anything outside the table.
    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, ty)| *ty)
    }

    /// Look up a single-character struct code.
    pub fn from_code(code: char) -> Option<Self> {
        let mut buf = [0u8; 4];
        Self::from_name(code.encode_utf8(&mut buf))
    }

    /// Width on the wire in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Bool | Self::Char | Self::Pad => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Canonical type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Pad => "pad",
        }
    }

    /// Single-character struct code.
    pub fn code(self) -> char {
        match self {
            Self::Int8 => 'b',
            Self::UInt8 => 'B',
            Self::Int16 => 'h',
            Self::UInt16 => 'H',
            Self::Int32 => 'l',
            Self::UInt32 => 'L',
            Self::Int64 => 'q',
            Self::UInt64 => 'Q',
            Self::Float32 => 'f',
            Self::Float64 => 'd',
            Self::Bool => '?',
            Self::Char => 'c',
            Self::Pad => 'x',
        }
    }

    /// Whether a field of this type yields a value when decoded.
    pub fn carries_value(self) -> bool {
        self != Self::Pad
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use telemlink_schema::{PrimitiveType, Schema};

use crate::clock::{ClockKind, SessionClock};
use crate::error::DecodeError;

/// One decoded scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Char(char),
}

impl Value {
    /// Numeric view of the value (booleans as 0/1, chars as their code).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
            Self::Bool(v) => f64::from(u8::from(v)),
            Self::Char(v) => f64::from(u32::from(v)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v:?}"),
        }
    }
}

/// A decoded, timestamped frame: one value row per channel, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Seconds since the session epoch, carry-over included.
    pub timestamp: f64,
    pub values: Vec<Vec<Value>>,
}

/// Unpack a payload into one value row per channel.
///
/// The payload must be exactly `schema.byte_size()` bytes; anything else is
/// rejected without a partial decode. Pad fields consume their byte and
/// produce no value.
pub fn decode_values(schema: &Schema, payload: &[u8]) -> Result<Vec<Vec<Value>>, DecodeError> {
    let expected = schema.byte_size();
    if payload.len() != expected {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: payload.len(),
        });
    }

    let mut offset = 0;
    let mut rows = Vec::with_capacity(schema.channels().len());
    for channel in schema.channels() {
        let mut row = Vec::with_capacity(channel.value_count());
        for primitive in channel.wire_format() {
            let width = primitive.width();
            if let Some(value) = read_value(primitive, &payload[offset..offset + width]) {
                row.push(value);
            }
            offset += width;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Decode a payload and stamp it with `clock`.
///
/// The clock only advances on success, so a rejected first frame does not
/// start the session epoch.
pub fn decode_record(
    schema: &Schema,
    payload: &[u8],
    clock: &mut SessionClock,
) -> Result<Record, DecodeError> {
    let values = decode_values(schema, payload)?;
    Ok(Record {
        timestamp: clock.stamp(),
        values,
    })
}

/// Pack one value row per channel into a payload, in native byte order.
///
/// The inverse of [`decode_values`]. Pad fields are written as zero.
pub fn encode_values(schema: &Schema, values: &[Vec<Value>]) -> Result<Vec<u8>, DecodeError> {
    let channels = schema.channels();
    if values.len() != channels.len() {
        return Err(DecodeError::ValueCount {
            channel: values.len().min(channels.len()),
            expected: channels.len(),
            actual: values.len(),
        });
    }

    let mut payload = Vec::with_capacity(schema.byte_size());
    for (channel_idx, (channel, row)) in channels.iter().zip(values).enumerate() {
        if row.len() != channel.value_count() {
            return Err(DecodeError::ValueCount {
                channel: channel_idx,
                expected: channel.value_count(),
                actual: row.len(),
            });
        }

        let mut row_values = row.iter().enumerate();
        for primitive in channel.wire_format() {
            if !primitive.carries_value() {
                payload.push(0);
                continue;
            }
            let Some((index, value)) = row_values.next() else {
                break;
            };
            write_value(primitive, value, &mut payload).ok_or(DecodeError::ValueType {
                channel: channel_idx,
                index,
                primitive,
            })?;
        }
    }
    Ok(payload)
}

/// Stateful decoder for one reader session.
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    schema: Arc<Schema>,
    clock: SessionClock,
}

impl RecordDecoder {
    pub fn new(schema: Arc<Schema>, clock: ClockKind) -> Self {
        Self::with_carry_over(schema, clock, 0.0)
    }

    /// A decoder whose timestamps continue from `carry_over` seconds.
    pub fn with_carry_over(schema: Arc<Schema>, clock: ClockKind, carry_over: f64) -> Self {
        Self {
            schema,
            clock: SessionClock::with_carry_over(clock, carry_over),
        }
    }

    pub fn decode(&mut self, payload: &[u8]) -> Result<Record, DecodeError> {
        decode_record(&self.schema, payload, &mut self.clock)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }
}

fn read_value(primitive: PrimitiveType, bytes: &[u8]) -> Option<Value> {
    let value = match primitive {
        PrimitiveType::Int8 => Value::Int(i64::from(i8::from_ne_bytes(array(bytes)))),
        PrimitiveType::UInt8 => Value::UInt(u64::from(bytes[0])),
        PrimitiveType::Int16 => Value::Int(i64::from(i16::from_ne_bytes(array(bytes)))),
        PrimitiveType::UInt16 => Value::UInt(u64::from(u16::from_ne_bytes(array(bytes)))),
        PrimitiveType::Int32 => Value::Int(i64::from(i32::from_ne_bytes(array(bytes)))),
        PrimitiveType::UInt32 => Value::UInt(u64::from(u32::from_ne_bytes(array(bytes)))),
        PrimitiveType::Int64 => Value::Int(i64::from_ne_bytes(array(bytes))),
        PrimitiveType::UInt64 => Value::UInt(u64::from_ne_bytes(array(bytes))),
        PrimitiveType::Float32 => Value::Float(f64::from(f32::from_ne_bytes(array(bytes)))),
        PrimitiveType::Float64 => Value::Float(f64::from_ne_bytes(array(bytes))),
        PrimitiveType::Bool => Value::Bool(bytes[0] != 0),
        PrimitiveType::Char => Value::Char(char::from(bytes[0])),
        PrimitiveType::Pad => return None,
    };
    Some(value)
}

// Callers slice exactly `width` bytes.
fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn write_value(primitive: PrimitiveType, value: &Value, out: &mut Vec<u8>) -> Option<()> {
    match primitive {
        PrimitiveType::Int8 => out.extend(i8::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::UInt8 => out.extend(u8::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::Int16 => out.extend(i16::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::UInt16 => out.extend(u16::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::Int32 => out.extend(i32::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::UInt32 => out.extend(u32::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::Int64 => out.extend(i64::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::UInt64 => out.extend(u64::try_from(integer(value)?).ok()?.to_ne_bytes()),
        PrimitiveType::Float32 => out.extend((float(value)? as f32).to_ne_bytes()),
        PrimitiveType::Float64 => out.extend(float(value)?.to_ne_bytes()),
        PrimitiveType::Bool => match value {
            Value::Bool(v) => out.push(u8::from(*v)),
            Value::Int(0) | Value::UInt(0) => out.push(0),
            Value::Int(1) | Value::UInt(1) => out.push(1),
            _ => return None,
        },
        PrimitiveType::Char => match value {
            Value::Char(c) => out.push(u8::try_from(u32::from(*c)).ok()?),
            Value::UInt(v) => out.push(u8::try_from(*v).ok()?),
            _ => return None,
        },
        PrimitiveType::Pad => out.push(0),
    }
    Some(())
}

fn integer(value: &Value) -> Option<i128> {
    match *value {
        Value::Int(v) => Some(i128::from(v)),
        Value::UInt(v) => Some(i128::from(v)),
        Value::Bool(v) => Some(i128::from(u8::from(v))),
        Value::Float(_) | Value::Char(_) => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Char(_) => None,
        other => Some(other.as_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel() -> Schema {
        Schema::from_format_strings(&["fff"]).unwrap()
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn decodes_float_channel() {
        let rows = decode_values(&accel(), &floats(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]]
        );
    }

    #[test]
    fn size_mismatch_by_one_byte_either_way() {
        let schema = accel();
        let payload = floats(&[1.0, 2.0, 3.0]);

        let short = decode_values(&schema, &payload[..11]).unwrap_err();
        assert_eq!(
            short,
            DecodeError::SizeMismatch {
                expected: 12,
                actual: 11
            }
        );

        let mut long = payload.clone();
        long.push(0);
        let err = decode_values(&schema, &long).unwrap_err();
        assert_eq!(
            err,
            DecodeError::SizeMismatch {
                expected: 12,
                actual: 13
            }
        );
    }

    #[test]
    fn channels_slice_in_declared_order() {
        let schema = Schema::from_format_strings(&["hB", "d?"]).unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(&(-2i16).to_ne_bytes());
        payload.push(200);
        payload.extend_from_slice(&0.5f64.to_ne_bytes());
        payload.push(1);

        let rows = decode_values(&schema, &payload).unwrap();
        assert_eq!(rows[0], vec![Value::Int(-2), Value::UInt(200)]);
        assert_eq!(rows[1], vec![Value::Float(0.5), Value::Bool(true)]);
    }

    #[test]
    fn pad_bytes_produce_no_values() {
        let schema = Schema::from_format_strings(&["Bxxc"]).unwrap();
        let rows = decode_values(&schema, &[7, 0xFF, 0xFF, b'A']).unwrap();
        assert_eq!(rows, vec![vec![Value::UInt(7), Value::Char('A')]]);
    }

    #[test]
    fn full_width_integers() {
        let schema = Schema::from_format_strings(&["qQlL"]).unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(&i64::MIN.to_ne_bytes());
        payload.extend_from_slice(&u64::MAX.to_ne_bytes());
        payload.extend_from_slice(&(-1i32).to_ne_bytes());
        payload.extend_from_slice(&u32::MAX.to_ne_bytes());

        let rows = decode_values(&schema, &payload).unwrap();
        assert_eq!(
            rows[0],
            vec![
                Value::Int(i64::MIN),
                Value::UInt(u64::MAX),
                Value::Int(-1),
                Value::UInt(u64::from(u32::MAX)),
            ]
        );
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let schema = Schema::from_format_strings(&["fxh", "Q?c"]).unwrap();
        let values = vec![
            vec![Value::Float(1.5), Value::Int(-300)],
            vec![Value::UInt(9), Value::Bool(false), Value::Char('z')],
        ];
        let payload = encode_values(&schema, &values).unwrap();
        assert_eq!(payload.len(), schema.byte_size());
        assert_eq!(decode_values(&schema, &payload).unwrap(), values);
    }

    #[test]
    fn encode_rejects_out_of_range_and_wrong_counts() {
        let schema = Schema::from_format_strings(&["B"]).unwrap();
        assert_eq!(
            encode_values(&schema, &[vec![Value::Int(256)]]).unwrap_err(),
            DecodeError::ValueType {
                channel: 0,
                index: 0,
                primitive: PrimitiveType::UInt8
            }
        );
        assert!(matches!(
            encode_values(&schema, &[vec![Value::UInt(1), Value::UInt(2)]]),
            Err(DecodeError::ValueCount { channel: 0, expected: 1, actual: 2 })
        ));
        assert!(matches!(
            encode_values(&schema, &[]),
            Err(DecodeError::ValueCount { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn decoder_stamps_only_successful_decodes() {
        let mut decoder = RecordDecoder::new(Arc::new(accel()), ClockKind::Monotonic);
        assert!(decoder.decode(&[0u8; 4]).is_err());
        assert!(!decoder.clock().is_started());

        let first = decoder.decode(&floats(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(first.timestamp, 0.0);
        let second = decoder.decode(&floats(&[4.0, 5.0, 6.0])).unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn values_display_plainly() {
        let row = [
            Value::Float(1.5),
            Value::Int(-1),
            Value::Bool(true),
            Value::Char('a'),
        ];
        let text: Vec<String> = row.iter().map(ToString::to_string).collect();
        assert_eq!(text, ["1.5", "-1", "true", "'a'"]);
        assert_eq!(Value::Bool(true).as_f64(), 1.0);
        assert_eq!(Value::Char('A').as_f64(), 65.0);
    }
}

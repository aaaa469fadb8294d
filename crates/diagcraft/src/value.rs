//! Typed values and the base data types they are parsed from and coerced into.

use std::fmt;

use crate::errors::{ConversionError, ValueParseError};

/// Base data types a physical or internal value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseDataType {
    AInt32,
    AUInt32,
    AFloat32,
    AFloat64,
    AAsciiString,
    AUtf8String,
    AByteField,
}

impl BaseDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseDataType::AInt32 => "A_INT32",
            BaseDataType::AUInt32 => "A_UINT32",
            BaseDataType::AFloat32 => "A_FLOAT32",
            BaseDataType::AFloat64 => "A_FLOAT64",
            BaseDataType::AAsciiString => "A_ASCIISTRING",
            BaseDataType::AUtf8String => "A_UTF8STRING",
            BaseDataType::AByteField => "A_BYTEFIELD",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, BaseDataType::AInt32 | BaseDataType::AUInt32)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, BaseDataType::AFloat32 | BaseDataType::AFloat64)
    }

    /// Parses the canonical text form of a value of this type.
    ///
    /// Numbers may be surrounded by whitespace. Byte fields are hex strings
    /// (`"1a2B"`), whitespace between digits is ignored.
    pub fn from_string(&self, text: &str) -> Result<Value, ValueParseError> {
        let err = || ValueParseError {
            base_data_type: *self,
            text: text.to_string(),
        };

        match self {
            BaseDataType::AInt32 => text
                .trim()
                .parse::<i32>()
                .map(|v| Value::Int(v.into()))
                .map_err(|_| err()),
            BaseDataType::AUInt32 => text
                .trim()
                .parse::<u32>()
                .map(|v| Value::UInt(v.into()))
                .map_err(|_| err()),
            BaseDataType::AFloat32 => text
                .trim()
                .parse::<f32>()
                .map(Value::Float32)
                .map_err(|_| err()),
            BaseDataType::AFloat64 => text
                .trim()
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|_| err()),
            BaseDataType::AAsciiString => {
                if text.is_ascii() {
                    Ok(Value::String(text.to_string()))
                } else {
                    Err(err())
                }
            }
            BaseDataType::AUtf8String => Ok(Value::String(text.to_string())),
            BaseDataType::AByteField => parse_hex(text).map(Value::Bytes).ok_or_else(err),
        }
    }

    /// Converts `value` into the variant this type is represented by.
    ///
    /// Integers are range checked against 32 bits, floats only become integers
    /// when they carry no fractional part.
    pub fn coerce(&self, value: &Value) -> Result<Value, ConversionError> {
        let mismatch = || ConversionError::TypeMismatch {
            expected: *self,
            value: value.clone(),
        };

        match self {
            BaseDataType::AInt32 => {
                let v = match value {
                    Value::Int(v) => i128::from(*v),
                    Value::UInt(v) => i128::from(*v),
                    Value::Float32(_) | Value::Float64(_) => {
                        let f = value.as_f64().ok_or_else(mismatch)?;
                        if f.fract() != 0.0 || !f.is_finite() {
                            return Err(mismatch());
                        }
                        f as i128
                    }
                    _ => return Err(mismatch()),
                };
                i32::try_from(v)
                    .map(|v| Value::Int(v.into()))
                    .map_err(|_| mismatch())
            }
            BaseDataType::AUInt32 => {
                let v = match value {
                    Value::Int(v) => i128::from(*v),
                    Value::UInt(v) => i128::from(*v),
                    Value::Float32(_) | Value::Float64(_) => {
                        let f = value.as_f64().ok_or_else(mismatch)?;
                        if f.fract() != 0.0 || !f.is_finite() {
                            return Err(mismatch());
                        }
                        f as i128
                    }
                    _ => return Err(mismatch()),
                };
                u32::try_from(v)
                    .map(|v| Value::UInt(v.into()))
                    .map_err(|_| mismatch())
            }
            BaseDataType::AFloat32 => value
                .as_f64()
                .map(|f| Value::Float32(f as f32))
                .ok_or_else(mismatch),
            BaseDataType::AFloat64 => value.as_f64().map(Value::Float64).ok_or_else(mismatch),
            BaseDataType::AAsciiString => match value {
                Value::String(s) if s.is_ascii() => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            BaseDataType::AUtf8String => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            BaseDataType::AByteField => match value {
                Value::Bytes(_) => Ok(value.clone()),
                _ => Err(mismatch()),
            },
        }
    }
}

impl fmt::Display for BaseDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical or internal parameter value.
///
/// Equality is numeric across the number variants: `Int(42)`, `UInt(42)` and
/// `Float64(42.0)` are all equal.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::String(_) | Value::Bytes(_) => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(i128::from(*v)),
            Value::UInt(v) => Some(i128::from(*v)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Int(_) | Value::UInt(_), Value::Int(_) | Value::UInt(_)) => {
                self.as_i128() == other.as_i128()
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(digits).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string_integers() {
        assert_eq!(BaseDataType::AUInt32.from_string("42"), Ok(Value::UInt(42)));
        assert_eq!(BaseDataType::AInt32.from_string(" -7 "), Ok(Value::Int(-7)));
        assert!(BaseDataType::AUInt32.from_string("-1").is_err());
        assert!(BaseDataType::AInt32.from_string("4294967296").is_err());
        assert!(BaseDataType::AUInt32.from_string("forty-two").is_err());
    }

    #[test]
    fn test_from_string_floats() {
        assert_eq!(BaseDataType::AFloat64.from_string("1.5"), Ok(Value::Float64(1.5)));
        assert_eq!(BaseDataType::AFloat32.from_string("0.25"), Ok(Value::Float32(0.25)));
        assert!(BaseDataType::AFloat64.from_string("").is_err());
    }

    #[test]
    fn test_from_string_text() {
        assert_eq!(
            BaseDataType::AAsciiString.from_string("ECU"),
            Ok(Value::String("ECU".to_string()))
        );
        assert!(BaseDataType::AAsciiString.from_string("Grüße").is_err());
        assert_eq!(
            BaseDataType::AUtf8String.from_string("Grüße"),
            Ok(Value::String("Grüße".to_string()))
        );
    }

    #[test]
    fn test_from_string_bytefield() {
        assert_eq!(
            BaseDataType::AByteField.from_string("1a 2B ff"),
            Ok(Value::Bytes(vec![0x1a, 0x2b, 0xff]))
        );
        assert!(BaseDataType::AByteField.from_string("abc").is_err());
        assert!(BaseDataType::AByteField.from_string("zz").is_err());
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int(42), Value::UInt(42));
        assert_eq!(Value::UInt(42), Value::Float64(42.0));
        assert_ne!(Value::Int(-1), Value::UInt(u64::MAX));
        assert_ne!(Value::UInt(42), Value::String("42".to_string()));
        assert_ne!(Value::Bytes(vec![42]), Value::UInt(42));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(BaseDataType::AUInt32.coerce(&Value::Int(5)), Ok(Value::UInt(5)));
        assert_eq!(BaseDataType::AInt32.coerce(&Value::Float64(-3.0)), Ok(Value::Int(-3)));
        assert!(BaseDataType::AUInt32.coerce(&Value::Int(-1)).is_err());
        assert!(BaseDataType::AInt32.coerce(&Value::Float64(1.5)).is_err());
        assert!(BaseDataType::AUInt32.coerce(&Value::UInt(1 << 32)).is_err());
        assert_eq!(BaseDataType::AFloat64.coerce(&Value::UInt(3)), Ok(Value::Float64(3.0)));
        assert!(BaseDataType::AByteField.coerce(&Value::UInt(3)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::UInt(42).to_string(), "42");
        assert_eq!(Value::String("x".to_string()).to_string(), "'x'");
        assert_eq!(Value::Bytes(vec![0x2a, 0x07]).to_string(), "0x2a07");
    }
}

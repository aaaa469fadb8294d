//! Value converters (data object properties).
//!
//! A [`Converter`] maps a typed physical value to an internal value through its
//! [`CompuMethod`], and an internal value to coded bytes through its
//! [`DiagCodedType`]. Converters whose computation is directly invertible
//! (identical or linear) are *simple*; only those may back constant parameters.

use crate::{
    bits::{self, ByteOrder},
    errors::{ConversionError, DecodeError, ReadError},
    odxlink::OdxLinkId,
    value::{BaseDataType, Value},
};

/// Standard-length coded representation of an internal value.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagCodedType {
    /// Type of the internal value.
    pub base_data_type: BaseDataType,
    /// Number of bits the value occupies on the wire.
    pub bit_length: usize,
    pub byte_order: ByteOrder,
}

impl DiagCodedType {
    pub fn new(base_data_type: BaseDataType, bit_length: usize) -> Self {
        Self {
            base_data_type,
            bit_length,
            byte_order: ByteOrder::default(),
        }
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) -> &mut Self {
        self.byte_order = byte_order;
        self
    }

    /// Number of bytes this coded type spans at `bit_position`.
    pub fn byte_length(&self, bit_position: usize) -> usize {
        bits::byte_span(self.bit_length, bit_position)
    }

    /// Checks the bit length and bit position against the base data type.
    fn validate(&self, bit_position: usize) -> Result<(), ConversionError> {
        let valid_length = match self.base_data_type {
            BaseDataType::AInt32 | BaseDataType::AUInt32 => (1..=32).contains(&self.bit_length),
            BaseDataType::AFloat32 => self.bit_length == 32,
            BaseDataType::AFloat64 => self.bit_length == 64,
            BaseDataType::AAsciiString | BaseDataType::AUtf8String | BaseDataType::AByteField => {
                self.bit_length > 0 && self.bit_length % 8 == 0
            }
        };

        if !valid_length {
            return Err(ConversionError::InvalidBitLength {
                base_data_type: self.base_data_type,
                bit_length: self.bit_length,
            });
        }

        let bytewise = !self.base_data_type.is_numeric();
        if bit_position > 7 || (bytewise && bit_position != 0) {
            return Err(ConversionError::InvalidBitPosition(bit_position));
        }

        Ok(())
    }

    /// Encodes an internal value into its byte span.
    pub fn encode(&self, internal: &Value, bit_position: usize) -> Result<Vec<u8>, ConversionError> {
        self.validate(bit_position)?;
        let internal = self.base_data_type.coerce(internal)?;

        let out_of_range = || ConversionError::OutOfRange {
            value: internal.clone(),
            bit_length: self.bit_length,
        };

        let raw = match &internal {
            Value::Int(v) => {
                let min = -(1i64 << (self.bit_length - 1));
                let max = (1i64 << (self.bit_length - 1)) - 1;
                if *v < min || *v > max {
                    return Err(out_of_range());
                }
                *v as u64
            }
            Value::UInt(v) => {
                if *v > bits::mask(self.bit_length) {
                    return Err(out_of_range());
                }
                *v
            }
            Value::Float32(v) => u64::from(v.to_bits()),
            Value::Float64(v) => v.to_bits(),
            Value::String(s) => return self.encode_bytes(s.as_bytes(), &internal),
            Value::Bytes(b) => return self.encode_bytes(b, &internal),
        };

        Ok(bits::pack_bits(
            raw,
            self.bit_length,
            bit_position,
            self.byte_order,
        ))
    }

    fn encode_bytes(&self, bytes: &[u8], internal: &Value) -> Result<Vec<u8>, ConversionError> {
        let len = self.bit_length / 8;
        if bytes.len() > len {
            return Err(ConversionError::OutOfRange {
                value: internal.clone(),
                bit_length: self.bit_length,
            });
        }

        let mut out = bytes.to_vec();
        out.resize(len, 0);
        Ok(out)
    }

    /// Decodes the internal value at `byte_position` and returns it with the position after the span.
    pub fn decode(
        &self,
        data: &[u8],
        byte_position: usize,
        bit_position: usize,
    ) -> Result<(Value, usize), DecodeError> {
        self.validate(bit_position)?;

        let value = match self.base_data_type {
            BaseDataType::AInt32 => {
                let raw = self.unpack(data, byte_position, bit_position)?;
                Value::Int(bits::sign_extend(raw, self.bit_length))
            }
            BaseDataType::AUInt32 => Value::UInt(self.unpack(data, byte_position, bit_position)?),
            BaseDataType::AFloat32 => {
                let raw = self.unpack(data, byte_position, bit_position)?;
                Value::Float32(f32::from_bits(raw as u32))
            }
            BaseDataType::AFloat64 => {
                Value::Float64(f64::from_bits(self.unpack(data, byte_position, bit_position)?))
            }
            BaseDataType::AAsciiString | BaseDataType::AUtf8String => {
                let bytes = bits::read_bytes_at(data, byte_position, self.bit_length / 8)?;
                let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                let text = std::str::from_utf8(&bytes[..end])
                    .map_err(|_| ReadError::InvalidEncoding(self.base_data_type))?;
                if self.base_data_type == BaseDataType::AAsciiString && !text.is_ascii() {
                    return Err(ReadError::InvalidEncoding(self.base_data_type).into());
                }
                Value::String(text.to_string())
            }
            BaseDataType::AByteField => Value::Bytes(
                bits::read_bytes_at(data, byte_position, self.bit_length / 8)?.to_vec(),
            ),
        };

        Ok((value, byte_position + self.byte_length(bit_position)))
    }

    fn unpack(&self, data: &[u8], byte_position: usize, bit_position: usize) -> Result<u64, ReadError> {
        bits::unpack_bits(
            data,
            byte_position,
            self.bit_length,
            bit_position,
            self.byte_order,
        )
    }
}

/// One row of a text table: internal code and its physical text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTableEntry {
    pub internal: i64,
    pub text: String,
}

/// How physical values map to internal values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompuMethod {
    /// Physical and internal value are the same number or text.
    #[default]
    Identical,
    /// `physical = internal * factor + offset`.
    Linear { factor: f64, offset: f64 },
    /// Internal integer codes map to physical texts.
    TextTable(Vec<TextTableEntry>),
}

/// A value converter: computation method plus coded type.
#[derive(Debug, Clone, PartialEq)]
pub struct Converter {
    pub short_name: String,
    pub odx_id: OdxLinkId,
    pub diag_coded_type: DiagCodedType,
    /// Type of the physical (caller-facing) value.
    pub physical_type: BaseDataType,
    pub compu_method: CompuMethod,
}

impl Converter {
    pub fn new(
        short_name: impl Into<String>,
        odx_id: OdxLinkId,
        diag_coded_type: DiagCodedType,
        physical_type: BaseDataType,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            odx_id,
            diag_coded_type,
            physical_type,
            compu_method: CompuMethod::default(),
        }
    }

    pub fn set_compu_method(&mut self, compu_method: CompuMethod) -> &mut Self {
        self.compu_method = compu_method;
        self
    }

    /// True when the physical-internal mapping is directly invertible.
    pub fn is_simple(&self) -> bool {
        matches!(
            self.compu_method,
            CompuMethod::Identical | CompuMethod::Linear { .. }
        )
    }

    pub fn physical_to_internal(&self, physical: &Value) -> Result<Value, ConversionError> {
        let internal_type = self.diag_coded_type.base_data_type;
        let physical = self.physical_type.coerce(physical)?;

        match &self.compu_method {
            CompuMethod::Identical => internal_type.coerce(&physical),
            CompuMethod::Linear { factor, offset } => {
                if *factor == 0.0 {
                    return Err(ConversionError::NotInvertible);
                }
                let p = physical.as_f64().ok_or(ConversionError::TypeMismatch {
                    expected: self.physical_type,
                    value: physical.clone(),
                })?;
                internal_type.coerce(&Value::Float64(round_for(internal_type, (p - offset) / factor)))
            }
            CompuMethod::TextTable(entries) => {
                let code = match &physical {
                    Value::String(text) => entries.iter().find(|e| &e.text == text),
                    _ => None,
                }
                .ok_or_else(|| ConversionError::UnknownTableEntry(physical.clone()))?;
                internal_type.coerce(&Value::Int(code.internal))
            }
        }
    }

    pub fn internal_to_physical(&self, internal: &Value) -> Result<Value, ConversionError> {
        match &self.compu_method {
            CompuMethod::Identical => self.physical_type.coerce(internal),
            CompuMethod::Linear { factor, offset } => {
                let i = internal.as_f64().ok_or(ConversionError::TypeMismatch {
                    expected: self.diag_coded_type.base_data_type,
                    value: internal.clone(),
                })?;
                let p = round_for(self.physical_type, i * factor + offset);
                self.physical_type.coerce(&Value::Float64(p))
            }
            CompuMethod::TextTable(entries) => {
                let entry = internal
                    .as_i128()
                    .and_then(|code| entries.iter().find(|e| i128::from(e.internal) == code))
                    .ok_or_else(|| ConversionError::UnknownTableEntry(internal.clone()))?;
                self.physical_type.coerce(&Value::String(entry.text.clone()))
            }
        }
    }

    /// Converts a physical value into coded bytes at `bit_position`.
    pub fn convert_physical_to_bytes(
        &self,
        physical: &Value,
        bit_position: usize,
    ) -> Result<Vec<u8>, ConversionError> {
        let internal = self.physical_to_internal(physical)?;
        self.diag_coded_type.encode(&internal, bit_position)
    }

    /// Extracts the physical value at `byte_position` and returns it with the position after the field.
    pub fn convert_bytes_to_physical(
        &self,
        data: &[u8],
        byte_position: usize,
        bit_position: usize,
    ) -> Result<(Value, usize), DecodeError> {
        let (internal, next) = self.diag_coded_type.decode(data, byte_position, bit_position)?;
        Ok((self.internal_to_physical(&internal)?, next))
    }
}

fn round_for(base_data_type: BaseDataType, value: f64) -> f64 {
    if base_data_type.is_integer() {
        value.round()
    } else {
        value
    }
}

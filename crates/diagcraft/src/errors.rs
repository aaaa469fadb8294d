//! Error types for schema resolution, value conversion, encoding and decoding.

use thiserror::Error;

use crate::{
    odxlink::OdxLinkId,
    state::DecodeDiagnostic,
    value::{BaseDataType, Value},
};

/// Errors produced while resolving references of the schema graph.
///
/// Each variant names the offending object so the loader can decide whether to
/// abort the load or quarantine the object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// An identifier or short-name reference points at nothing.
    #[error("'{object}' references unknown object {reference}")]
    UnresolvedReference { object: String, reference: String },
    /// A constant parameter references a converter without a directly invertible mapping.
    #[error("parameter '{parameter}' must reference a simple converter, '{converter}' is not one")]
    IncompatibleConverter { parameter: String, converter: String },
    /// The schema-authored value text does not parse under the converter's physical type.
    #[error("parameter '{parameter}': {source}")]
    MalformedConstantValue {
        parameter: String,
        #[source]
        source: ValueParseError,
    },
    /// The default value text of a value parameter does not parse under the converter's physical type.
    #[error("parameter '{parameter}' default: {source}")]
    MalformedDefaultValue {
        parameter: String,
        #[source]
        source: ValueParseError,
    },
    /// The constant does not come back unchanged from its converter's encode and decode.
    #[error("constant {constant} of parameter '{parameter}' is not exactly representable by converter '{converter}'")]
    UnrepresentableConstant {
        parameter: String,
        converter: String,
        constant: Value,
    },
    /// Two schema objects share the same odxlink id.
    #[error("odxlink id {0} is defined more than once")]
    DuplicateLinkId(OdxLinkId),
}

/// Text could not be parsed as a value of the given base data type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{text}' is not a valid {base_data_type} value")]
pub struct ValueParseError {
    pub base_data_type: BaseDataType,
    pub text: String,
}

/// Errors produced when reading raw bytes out of a coded message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Requested byte range is beyond the end of the data.
    #[error("field at byte {byte_position} spanning {byte_length} bytes exceeds message of {message_length} bytes")]
    OutOfBounds {
        byte_position: usize,
        byte_length: usize,
        message_length: usize,
    },
    /// Bytes are not valid for the textual base data type.
    #[error("bytes are not a valid {0} value")]
    InvalidEncoding(BaseDataType),
}

/// Errors produced by a converter when mapping between physical, internal and coded values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Value cannot be coerced into the required base data type.
    #[error("value {value} cannot be represented as {expected}")]
    TypeMismatch {
        expected: BaseDataType,
        value: Value,
    },
    /// Integer value needs more bits than the coded type provides.
    #[error("value {value} does not fit into {bit_length} bits")]
    OutOfRange { value: Value, bit_length: usize },
    /// Bit length is not allowed for the base data type.
    #[error("{base_data_type} cannot be coded with a bit length of {bit_length}")]
    InvalidBitLength {
        base_data_type: BaseDataType,
        bit_length: usize,
    },
    /// Bit position is above 7, or set on a byte-aligned type.
    #[error("bit position {0} is not supported here")]
    InvalidBitPosition(usize),
    /// Linear computation cannot be reversed.
    #[error("linear computation with factor 0 is not invertible")]
    NotInvertible,
    /// Text table has no entry for the value.
    #[error("value {0} has no text table entry")]
    UnknownTableEntry(Value),
}

/// Errors aborting the encoding of a message.
///
/// A partially built buffer must be discarded when any of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// A caller-supplied value contradicts the schema constant.
    #[error("parameter '{parameter}' is constant {expected} and cannot be set to {got}")]
    ValueConflict {
        parameter: String,
        expected: Value,
        got: Value,
    },
    /// A required parameter has neither a caller-supplied value nor a default.
    #[error("no value supplied for parameter '{0}'")]
    MissingValue(String),
    /// The parameter was never successfully resolved.
    #[error("parameter '{0}' is not resolved")]
    Unresolved(String),
    /// The parameter's value could not be converted into coded bytes.
    #[error("parameter '{parameter}': {source}")]
    Conversion {
        parameter: String,
        #[source]
        source: ConversionError,
    },
    /// The field would end beyond the largest addressable message.
    #[error("field at byte {byte_position} spanning {byte_length} bytes exceeds the addressable message size")]
    OutOfBounds {
        byte_position: usize,
        byte_length: usize,
    },
}

/// Errors aborting the decoding of a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The parameter was never successfully resolved.
    #[error("parameter '{0}' is not resolved")]
    Unresolved(String),
    /// The field lies outside the coded message or has invalid bytes.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// The coded value could not be mapped to a physical value.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// A constant field carried an unexpected value while decoding in strict mode.
    #[error("{0}")]
    ConstantMismatch(Box<DecodeDiagnostic>),
}

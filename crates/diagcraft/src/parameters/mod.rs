//! Parameters: named fields of a structure with a position and a converter.
//!
//! All kinds share a [`ParameterBase`]. The converter reference is resolved in
//! two passes, identifier references first and short-name references second,
//! and only the resolution passes may bind it.

mod constant;
mod value;

use std::{fmt, sync::Arc};

pub use constant::ConstantParameter;
pub use value::ValueParameter;

use crate::{
    converter::Converter,
    diaglayer::DiagLayerScope,
    errors::{DecodeError, EncodeError, ReadError, ResolveError},
    odxlink::{LinkRegistry, OdxLinkRef},
    state::{DecodeDiagnostic, DecodeState, EncodeState},
    value::Value,
};

/// How a parameter refers to its converter. Exactly one form exists per parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DopReference {
    /// By odxlink identifier, resolved against the [`LinkRegistry`].
    Id(OdxLinkRef),
    /// By short name, resolved against the enclosing diag layer.
    Name(String),
}

impl fmt::Display for DopReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DopReference::Id(reference) => write!(f, "dop_ref={reference}"),
            DopReference::Name(name) => write!(f, "dop_snref='{name}'"),
        }
    }
}

/// Fields shared by every parameter kind.
#[derive(Debug, Clone)]
pub struct ParameterBase {
    /// Unique within the enclosing structure; key of caller-supplied values.
    pub short_name: String,
    pub long_name: Option<String>,
    pub semantic: Option<String>,
    pub description: Option<String>,
    /// Offset from the structure origin. Without it the field follows the cursor.
    pub byte_position: Option<usize>,
    /// Offset above the least significant bit of the field's byte span, 0 if absent.
    pub bit_position: Option<usize>,
    pub dop: DopReference,
    resolved_dop: Option<Arc<Converter>>,
}

impl ParameterBase {
    pub fn new(short_name: impl Into<String>, dop: DopReference) -> Self {
        Self {
            short_name: short_name.into(),
            long_name: None,
            semantic: None,
            description: None,
            byte_position: None,
            bit_position: None,
            dop,
            resolved_dop: None,
        }
    }

    pub fn set_long_name(&mut self, long_name: impl Into<String>) -> &mut Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn set_semantic(&mut self, semantic: impl Into<String>) -> &mut Self {
        self.semantic = Some(semantic.into());
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_byte_position(&mut self, byte_position: usize) -> &mut Self {
        self.byte_position = Some(byte_position);
        self
    }

    pub fn set_bit_position(&mut self, bit_position: usize) -> &mut Self {
        self.bit_position = Some(bit_position);
        self
    }

    /// The resolved converter, if resolution has bound one.
    pub fn dop(&self) -> Option<&Arc<Converter>> {
        self.resolved_dop.as_ref()
    }

    fn bind_dop(&mut self, dop: Option<Arc<Converter>>) {
        self.resolved_dop = dop;
    }

    /// `Ok(None)` when the converter is referenced by name.
    fn lookup_by_id(&self, registry: &LinkRegistry) -> Result<Option<Arc<Converter>>, ResolveError> {
        let DopReference::Id(dop_ref) = &self.dop else {
            return Ok(None);
        };

        registry
            .resolve_converter(dop_ref)
            .cloned()
            .map(Some)
            .ok_or_else(|| self.unresolved())
    }

    /// `Ok(None)` when the converter is referenced by identifier.
    fn lookup_by_name(&self, scope: &DiagLayerScope) -> Result<Option<Arc<Converter>>, ResolveError> {
        let DopReference::Name(name) = &self.dop else {
            return Ok(None);
        };

        scope
            .find_converter(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| self.unresolved())
    }

    fn unresolved(&self) -> ResolveError {
        let reference = match &self.dop {
            DopReference::Id(dop_ref) => dop_ref.to_string(),
            DopReference::Name(name) => format!("'{name}'"),
        };

        ResolveError::UnresolvedReference {
            object: self.short_name.clone(),
            reference,
        }
    }

    /// Absolute position of the field, or `None` if it overflows `usize`.
    fn byte_position_in(&self, cursor_byte_position: usize, origin_byte_position: usize) -> Option<usize> {
        match self.byte_position {
            Some(byte_position) => origin_byte_position.checked_add(byte_position),
            None => Some(cursor_byte_position),
        }
    }

    /// Converts `physical` and writes it at this parameter's position.
    fn encode_physical(&self, physical: &Value, state: &mut EncodeState) -> Result<(), EncodeError> {
        let dop = self
            .dop()
            .ok_or_else(|| EncodeError::Unresolved(self.short_name.clone()))?;

        let bytes = dop
            .convert_physical_to_bytes(physical, self.bit_position.unwrap_or(0))
            .map_err(|source| EncodeError::Conversion {
                parameter: self.short_name.clone(),
                source,
            })?;

        let byte_position = self
            .byte_position_in(state.cursor_byte_position, state.origin_byte_position)
            .ok_or(EncodeError::OutOfBounds {
                byte_position: self.byte_position.unwrap_or_default(),
                byte_length: bytes.len(),
            })?;
        state.emplace_bytes(byte_position, &bytes)?;
        log::trace!(
            "encoded '{}' = {} at byte {}",
            self.short_name,
            physical,
            byte_position
        );

        Ok(())
    }

    /// Reads the physical value at this parameter's position and advances the cursor.
    ///
    /// Returns the value, the byte position it started at and the position after it.
    fn decode_physical(&self, state: &mut DecodeState<'_>) -> Result<(Value, usize, usize), DecodeError> {
        let dop = self
            .dop()
            .ok_or_else(|| DecodeError::Unresolved(self.short_name.clone()))?;

        let bit_position = self.bit_position.unwrap_or(0);
        let byte_position = self
            .byte_position_in(state.cursor_byte_position(), state.origin_byte_position)
            .ok_or(ReadError::OutOfBounds {
                byte_position: self.byte_position.unwrap_or_default(),
                byte_length: dop.diag_coded_type.byte_length(bit_position),
                message_length: state.coded_message().len(),
            })?;
        let (value, next_byte_position) = dop.convert_bytes_to_physical(
            state.coded_message(),
            byte_position,
            bit_position,
        )?;
        state.advance_to(next_byte_position);

        log::trace!(
            "decoded '{}' = {} at byte {}",
            self.short_name,
            value,
            byte_position
        );

        Ok((value, byte_position, next_byte_position))
    }

    fn fmt_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(long_name) = &self.long_name {
            write!(f, ", long_name='{long_name}'")?;
        }
        if let Some(byte_position) = self.byte_position {
            write!(f, ", byte_position='{byte_position}'")?;
        }
        if let Some(bit_position) = self.bit_position {
            write!(f, ", bit_position='{bit_position}'")?;
        }
        if let Some(semantic) = &self.semantic {
            write!(f, ", semantic='{semantic}'")?;
        }
        write!(f, ", {}", self.dop)?;
        if let Some(description) = &self.description {
            let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
            write!(f, ", description='{description}'")?;
        }

        Ok(())
    }
}

/// Result of decoding one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedParameter {
    /// The value found on the wire.
    pub value: Value,
    /// Byte position right after the field.
    pub next_byte_position: usize,
    /// Non-fatal findings for this field.
    pub diagnostics: Vec<DecodeDiagnostic>,
}

/// A parameter of any supported kind.
#[derive(Debug, Clone)]
pub enum Parameter {
    Constant(ConstantParameter),
    Value(ValueParameter),
}

impl Parameter {
    pub fn base(&self) -> &ParameterBase {
        match self {
            Parameter::Constant(p) => &p.base,
            Parameter::Value(p) => &p.base,
        }
    }

    pub fn short_name(&self) -> &str {
        &self.base().short_name
    }

    /// ODX name of the parameter kind.
    pub fn parameter_type(&self) -> &'static str {
        match self {
            Parameter::Constant(_) => "PHYS-CONST",
            Parameter::Value(_) => "VALUE",
        }
    }

    /// Whether the caller must supply a value when encoding.
    pub fn is_required(&self) -> bool {
        match self {
            Parameter::Constant(p) => p.is_required(),
            Parameter::Value(p) => p.is_required(),
        }
    }

    /// Whether the caller may supply a value when encoding.
    pub fn is_optional(&self) -> bool {
        match self {
            Parameter::Constant(p) => p.is_optional(),
            Parameter::Value(p) => p.is_optional(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Parameter::Constant(p) => p.is_resolved(),
            Parameter::Value(p) => p.is_resolved(),
        }
    }

    pub fn resolve_identifier_refs(&mut self, registry: &LinkRegistry) -> Result<(), ResolveError> {
        match self {
            Parameter::Constant(p) => p.resolve_identifier_refs(registry),
            Parameter::Value(p) => p.resolve_identifier_refs(registry),
        }
    }

    pub fn resolve_name_refs(&mut self, scope: &DiagLayerScope) -> Result<(), ResolveError> {
        match self {
            Parameter::Constant(p) => p.resolve_name_refs(scope),
            Parameter::Value(p) => p.resolve_name_refs(scope),
        }
    }

    pub fn encode(&self, state: &mut EncodeState) -> Result<(), EncodeError> {
        match self {
            Parameter::Constant(p) => p.encode(state),
            Parameter::Value(p) => p.encode(state),
        }
    }

    pub fn decode(&self, state: &mut DecodeState<'_>) -> Result<DecodedParameter, DecodeError> {
        match self {
            Parameter::Constant(p) => p.decode(state),
            Parameter::Value(p) => p.decode(state),
        }
    }
}

impl From<ConstantParameter> for Parameter {
    fn from(value: ConstantParameter) -> Self {
        Parameter::Constant(value)
    }
}

impl From<ValueParameter> for Parameter {
    fn from(value: ValueParameter) -> Self {
        Parameter::Value(value)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Constant(p) => fmt::Display::fmt(p, f),
            Parameter::Value(p) => fmt::Display::fmt(p, f),
        }
    }
}

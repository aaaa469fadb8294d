use std::{fmt, sync::Arc};

use crate::{
    converter::Converter,
    diaglayer::DiagLayerScope,
    errors::{DecodeError, EncodeError, ResolveError},
    odxlink::LinkRegistry,
    state::{DecodeDiagnostic, DecodeMode, DecodeState, EncodeState},
    value::Value,
};

use super::{DecodedParameter, ParameterBase};

/// A field whose physical value is fixed by the schema.
///
/// The value still occupies bits on the wire. Encoding writes the constant and
/// rejects caller values that contradict it; decoding checks the wire value
/// against it and reports mismatches without failing (unless the decode state
/// is strict).
#[derive(Debug, Clone)]
pub struct ConstantParameter {
    pub base: ParameterBase,
    /// Schema-authored text of the constant, parsed during resolution.
    pub physical_constant_value_raw: String,
    physical_constant_value: Option<Value>,
}

impl ConstantParameter {
    pub fn new(base: ParameterBase, physical_constant_value_raw: impl Into<String>) -> Self {
        Self {
            base,
            physical_constant_value_raw: physical_constant_value_raw.into(),
            physical_constant_value: None,
        }
    }

    pub fn is_required(&self) -> bool {
        false
    }

    pub fn is_optional(&self) -> bool {
        false
    }

    pub fn is_resolved(&self) -> bool {
        self.physical_constant_value.is_some()
    }

    /// The typed constant.
    ///
    /// # Panics
    ///
    /// Panics if the parameter has not been resolved. Use
    /// [`ConstantParameter::try_physical_constant_value`] when that is not known.
    pub fn physical_constant_value(&self) -> &Value {
        match &self.physical_constant_value {
            Some(value) => value,
            None => panic!(
                "constant value of parameter '{}' read before resolution",
                self.base.short_name
            ),
        }
    }

    pub fn try_physical_constant_value(&self) -> Option<&Value> {
        self.physical_constant_value.as_ref()
    }

    /// The constant in the converter's internal representation.
    pub fn coded_value(&self) -> Result<Value, EncodeError> {
        let (dop, constant) = self.resolved()?;
        dop.physical_to_internal(constant)
            .map_err(|source| EncodeError::Conversion {
                parameter: self.base.short_name.clone(),
                source,
            })
    }

    pub fn resolve_identifier_refs(&mut self, registry: &LinkRegistry) -> Result<(), ResolveError> {
        let found = self.base.lookup_by_id(registry);
        self.bind(found)
    }

    pub fn resolve_name_refs(&mut self, scope: &DiagLayerScope) -> Result<(), ResolveError> {
        let found = self.base.lookup_by_name(scope);
        self.bind(found)
    }

    /// Binds the converter and the parsed constant together, or neither.
    fn bind(&mut self, found: Result<Option<Arc<Converter>>, ResolveError>) -> Result<(), ResolveError> {
        let dop = match found {
            Ok(Some(dop)) => dop,
            Ok(None) => return Ok(()),
            Err(err) => {
                self.unbind();
                return Err(err);
            }
        };
        self.unbind();

        if !dop.is_simple() {
            return Err(ResolveError::IncompatibleConverter {
                parameter: self.base.short_name.clone(),
                converter: dop.short_name.clone(),
            });
        }

        let value = dop
            .physical_type
            .from_string(&self.physical_constant_value_raw)
            .map_err(|source| ResolveError::MalformedConstantValue {
                parameter: self.base.short_name.clone(),
                source,
            })?;

        if !round_trips(&dop, &value, self.base.bit_position.unwrap_or(0)) {
            return Err(ResolveError::UnrepresentableConstant {
                parameter: self.base.short_name.clone(),
                converter: dop.short_name.clone(),
                constant: value,
            });
        }

        self.base.bind_dop(Some(dop));
        self.physical_constant_value = Some(value);

        Ok(())
    }

    fn unbind(&mut self) {
        self.base.bind_dop(None);
        self.physical_constant_value = None;
    }

    fn resolved(&self) -> Result<(&Arc<Converter>, &Value), EncodeError> {
        match (self.base.dop(), &self.physical_constant_value) {
            (Some(dop), Some(constant)) => Ok((dop, constant)),
            _ => Err(EncodeError::Unresolved(self.base.short_name.clone())),
        }
    }

    /// Writes the constant into the message.
    ///
    /// A caller-supplied value for this parameter must equal the constant;
    /// otherwise nothing is written and [`EncodeError::ValueConflict`] is returned.
    pub fn encode(&self, state: &mut EncodeState) -> Result<(), EncodeError> {
        let (_, constant) = self.resolved()?;

        if let Some(got) = state.parameter_value(&self.base.short_name) {
            if got != constant {
                return Err(EncodeError::ValueConflict {
                    parameter: self.base.short_name.clone(),
                    expected: constant.clone(),
                    got: got.clone(),
                });
            }
        }

        self.base.encode_physical(constant, state)
    }

    /// Reads the field and checks it against the constant.
    ///
    /// The decoded value is returned even if it differs from the constant, so
    /// the fields after it decode unaffected.
    pub fn decode(&self, state: &mut DecodeState<'_>) -> Result<DecodedParameter, DecodeError> {
        let expected = self
            .physical_constant_value
            .as_ref()
            .ok_or_else(|| DecodeError::Unresolved(self.base.short_name.clone()))?;

        let (value, byte_position, next_byte_position) = self.base.decode_physical(state)?;

        let mut diagnostics = Vec::new();
        if value != *expected {
            let diagnostic = DecodeDiagnostic {
                parameter: self.base.short_name.clone(),
                expected: expected.clone(),
                actual: value.clone(),
                byte_position,
                coded_message: state.coded_message().to_vec(),
            };

            if state.mode == DecodeMode::Strict {
                return Err(DecodeError::ConstantMismatch(Box::new(diagnostic)));
            }

            log::warn!("{diagnostic}");
            state.report(diagnostic.clone());
            diagnostics.push(diagnostic);
        }

        Ok(DecodedParameter {
            value,
            next_byte_position,
            diagnostics,
        })
    }
}

/// True when `constant` is coded and decoded back to an equal value.
fn round_trips(dop: &Converter, constant: &Value, bit_position: usize) -> bool {
    let Ok(bytes) = dop.convert_physical_to_bytes(constant, bit_position) else {
        return false;
    };

    matches!(
        dop.convert_bytes_to_physical(&bytes, 0, bit_position),
        Ok((decoded, _)) if decoded == *constant
    )
}

impl fmt::Display for ConstantParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysicalConstantParameter(short_name='{}'",
            self.base.short_name
        )?;
        match &self.physical_constant_value {
            Some(value) => write!(f, ", physical_constant_value={value}")?,
            None => write!(
                f,
                ", physical_constant_value_raw='{}'",
                self.physical_constant_value_raw
            )?,
        }
        self.base.fmt_fields(f)?;
        write!(f, ")")
    }
}

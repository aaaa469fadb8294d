//! Ordered parameter lists and the sequential driver that feeds a fresh state through them.

use std::collections::BTreeMap;

use crate::{
    diaglayer::DiagLayerScope,
    errors::{DecodeError, EncodeError, ResolveError},
    odxlink::LinkRegistry,
    parameters::Parameter,
    state::{DecodeDiagnostic, DecodeMode, DecodeState, EncodeState},
    value::Value,
};

#[derive(Debug, Clone)]
pub struct Structure {
    pub short_name: String,
    pub parameters: Vec<Parameter>,
}

/// Every parameter value of a decoded structure, plus what the decoder noticed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStructure {
    pub values: BTreeMap<String, Value>,
    pub diagnostics: Vec<DecodeDiagnostic>,
    /// Byte position right after the last decoded field.
    pub byte_length: usize,
}

impl Structure {
    pub fn new(short_name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            short_name: short_name.into(),
            parameters,
        }
    }

    pub fn parameter(&self, short_name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.short_name() == short_name)
    }

    pub(crate) fn resolve_identifier_refs(&mut self, registry: &LinkRegistry, errors: &mut Vec<ResolveError>) {
        for parameter in &mut self.parameters {
            if let Err(err) = parameter.resolve_identifier_refs(registry) {
                errors.push(err);
            }
        }
    }

    pub(crate) fn resolve_name_refs(&mut self, scope: &DiagLayerScope, errors: &mut Vec<ResolveError>) {
        for parameter in &mut self.parameters {
            if let Err(err) = parameter.resolve_name_refs(scope) {
                errors.push(err);
            }
        }
    }

    /// Encodes all parameters in order into a new message.
    ///
    /// On error the partially written message is dropped.
    pub fn encode(&self, parameter_values: BTreeMap<String, Value>) -> Result<Vec<u8>, EncodeError> {
        let mut state = EncodeState::new(parameter_values);

        for parameter in &self.parameters {
            parameter.encode(&mut state)?;
        }

        Ok(state.into_coded_message())
    }

    /// Decodes all parameters in order from `data`.
    pub fn decode(&self, data: &[u8], mode: DecodeMode) -> Result<DecodedStructure, DecodeError> {
        let mut state = DecodeState::with_mode(data, mode);
        let mut values = BTreeMap::new();

        for parameter in &self.parameters {
            let decoded = parameter.decode(&mut state)?;
            values.insert(parameter.short_name().to_string(), decoded.value);
        }

        if !state.diagnostics().is_empty() {
            log::debug!(
                "'{}' decoded with {} diagnostic(s)",
                self.short_name,
                state.diagnostics().len()
            );
        }

        Ok(DecodedStructure {
            values,
            byte_length: state.cursor_byte_position(),
            diagnostics: state.take_diagnostics(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        errors::ReadError,
        odxlink::OdxLinkRef,
        parameters::{
            ConstantParameter, DopReference, ParameterBase, ValueParameter,
            test_support::{registry_with, uint8},
        },
    };

    use super::*;

    /// `sid` (constant 0x22) followed by a caller-supplied `did_low`.
    fn request() -> Structure {
        let registry = registry_with(&[uint8()]);
        let dop_ref = || DopReference::Id(OdxLinkRef::new("DOP.uint8", "ECU"));

        let mut sid_base = ParameterBase::new("sid", dop_ref());
        sid_base.set_byte_position(0);
        let sid = ConstantParameter::new(sid_base, "34");

        let did = ValueParameter::new(ParameterBase::new("did_low", dop_ref()));

        let mut structure = Structure::new("request", vec![sid.into(), did.into()]);
        let mut errors = Vec::new();
        structure.resolve_identifier_refs(&registry, &mut errors);
        assert!(errors.is_empty());
        structure
    }

    #[test]
    fn test_encode_sequential() {
        let bytes = request()
            .encode(BTreeMap::from([("did_low".to_string(), Value::UInt(0x10))]))
            .unwrap();
        assert_eq!(bytes, vec![0x22, 0x10]);
    }

    #[test]
    fn test_encode_conflict_aborts_message() {
        let result = request().encode(BTreeMap::from([
            ("sid".to_string(), Value::UInt(0x2e)),
            ("did_low".to_string(), Value::UInt(0x10)),
        ]));
        assert!(matches!(result, Err(EncodeError::ValueConflict { .. })));
    }

    #[test]
    fn test_decode_mismatch_does_not_shift_following_fields() {
        let decoded = request().decode(&[0x2e, 0x10], DecodeMode::Lenient).unwrap();

        assert_eq!(decoded.values["sid"], Value::UInt(0x2e));
        assert_eq!(decoded.values["did_low"], Value::UInt(0x10));
        assert_eq!(decoded.byte_length, 2);
        assert_eq!(decoded.diagnostics.len(), 1);
        assert_eq!(decoded.diagnostics[0].parameter, "sid");
    }

    #[test]
    fn test_decode_strict() {
        assert!(matches!(
            request().decode(&[0x2e, 0x10], DecodeMode::Strict),
            Err(DecodeError::ConstantMismatch(_))
        ));
        assert!(request().decode(&[0x22, 0x10], DecodeMode::Strict).is_ok());
    }

    #[test]
    fn test_position_past_addressable_end() {
        let mut base = ParameterBase::new("far", DopReference::Id(OdxLinkRef::new("DOP.uint8", "ECU")));
        base.set_byte_position(usize::MAX);
        let mut structure = Structure::new("far", vec![ValueParameter::new(base).into()]);
        let mut errors = Vec::new();
        structure.resolve_identifier_refs(&registry_with(&[uint8()]), &mut errors);
        assert!(errors.is_empty());

        assert_eq!(
            structure.encode(BTreeMap::from([("far".to_string(), Value::UInt(1))])),
            Err(EncodeError::OutOfBounds {
                byte_position: usize::MAX,
                byte_length: 1,
            })
        );
        assert!(matches!(
            structure.decode(&[0x01], DecodeMode::Lenient),
            Err(DecodeError::Read(ReadError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_parameter_lookup() {
        let structure = request();
        assert_eq!(structure.parameter("sid").unwrap().parameter_type(), "PHYS-CONST");
        assert!(structure.parameter("missing").is_none());
    }
}

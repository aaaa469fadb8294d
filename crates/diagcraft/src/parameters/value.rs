use std::{fmt, sync::Arc};

use crate::{
    converter::Converter,
    diaglayer::DiagLayerScope,
    errors::{DecodeError, EncodeError, ResolveError},
    odxlink::LinkRegistry,
    state::{DecodeState, EncodeState},
    value::Value,
};

use super::{DecodedParameter, ParameterBase};

/// A field whose value is supplied by the caller, optionally with a schema default.
#[derive(Debug, Clone)]
pub struct ValueParameter {
    pub base: ParameterBase,
    pub physical_default_value_raw: Option<String>,
    physical_default_value: Option<Value>,
}

impl ValueParameter {
    pub fn new(base: ParameterBase) -> Self {
        Self {
            base,
            physical_default_value_raw: None,
            physical_default_value: None,
        }
    }

    pub fn set_physical_default_value_raw(&mut self, raw: impl Into<String>) -> &mut Self {
        self.physical_default_value_raw = Some(raw.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.physical_default_value_raw.is_none()
    }

    pub fn is_optional(&self) -> bool {
        !self.is_required()
    }

    pub fn is_resolved(&self) -> bool {
        self.base.dop().is_some()
    }

    pub fn physical_default_value(&self) -> Option<&Value> {
        self.physical_default_value.as_ref()
    }

    pub fn resolve_identifier_refs(&mut self, registry: &LinkRegistry) -> Result<(), ResolveError> {
        let found = self.base.lookup_by_id(registry);
        self.bind(found)
    }

    pub fn resolve_name_refs(&mut self, scope: &DiagLayerScope) -> Result<(), ResolveError> {
        let found = self.base.lookup_by_name(scope);
        self.bind(found)
    }

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

        let default = match &self.physical_default_value_raw {
            Some(raw) => Some(dop.physical_type.from_string(raw).map_err(|source| {
                ResolveError::MalformedDefaultValue {
                    parameter: self.base.short_name.clone(),
                    source,
                }
            })?),
            None => None,
        };

        self.base.bind_dop(Some(dop));
        self.physical_default_value = default;

        Ok(())
    }

    fn unbind(&mut self) {
        self.base.bind_dop(None);
        self.physical_default_value = None;
    }

    /// Writes the caller-supplied value, or the default when none was supplied.
    pub fn encode(&self, state: &mut EncodeState) -> Result<(), EncodeError> {
        if !self.is_resolved() {
            return Err(EncodeError::Unresolved(self.base.short_name.clone()));
        }

        let value = state
            .parameter_value(&self.base.short_name)
            .or(self.physical_default_value.as_ref())
            .cloned()
            .ok_or_else(|| EncodeError::MissingValue(self.base.short_name.clone()))?;

        self.base.encode_physical(&value, state)
    }

    pub fn decode(&self, state: &mut DecodeState<'_>) -> Result<DecodedParameter, DecodeError> {
        let (value, _, next_byte_position) = self.base.decode_physical(state)?;

        Ok(DecodedParameter {
            value,
            next_byte_position,
            diagnostics: Vec::new(),
        })
    }
}

impl fmt::Display for ValueParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueParameter(short_name='{}'", self.base.short_name)?;
        if let Some(raw) = &self.physical_default_value_raw {
            write!(f, ", physical_default_value_raw='{raw}'")?;
        }
        self.base.fmt_fields(f)?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{
        errors::ValueParseError,
        odxlink::OdxLinkRef,
        parameters::{
            DopReference,
            test_support::{registry_with, session_table, uint8},
        },
        value::BaseDataType,
    };

    use super::*;

    fn value_v(dop_id: &str) -> ValueParameter {
        ValueParameter::new(ParameterBase::new("v", DopReference::Id(OdxLinkRef::new(dop_id, "ECU"))))
    }

    #[test]
    fn test_encode_requires_value() {
        let mut param = value_v("DOP.uint8");
        param
            .resolve_identifier_refs(&registry_with(&[uint8()]))
            .unwrap();
        assert!(param.is_required());

        let mut state = EncodeState::default();
        assert_eq!(
            param.encode(&mut state),
            Err(EncodeError::MissingValue("v".to_string()))
        );

        let mut state = EncodeState::new(BTreeMap::from([("v".to_string(), Value::UInt(9))]));
        param.encode(&mut state).unwrap();
        assert_eq!(state.coded_message, vec![9]);
    }

    #[test]
    fn test_default_value() {
        let mut param = value_v("DOP.uint8");
        param.set_physical_default_value_raw("5");
        param
            .resolve_identifier_refs(&registry_with(&[uint8()]))
            .unwrap();

        assert!(param.is_optional());
        assert_eq!(param.physical_default_value(), Some(&Value::UInt(5)));

        let mut state = EncodeState::default();
        param.encode(&mut state).unwrap();
        assert_eq!(state.coded_message, vec![5]);
    }

    #[test]
    fn test_malformed_default_value() {
        let mut param = value_v("DOP.uint8");
        param.set_physical_default_value_raw("five");

        assert_eq!(
            param.resolve_identifier_refs(&registry_with(&[uint8()])),
            Err(ResolveError::MalformedDefaultValue {
                parameter: "v".to_string(),
                source: ValueParseError {
                    base_data_type: BaseDataType::AUInt32,
                    text: "five".to_string(),
                },
            })
        );
        assert!(!param.is_resolved());
    }

    #[test]
    fn test_text_table_converter_is_accepted() {
        let mut param = value_v("DOP.session");
        param
            .resolve_identifier_refs(&registry_with(&[session_table()]))
            .unwrap();

        let data = [1];
        let mut state = DecodeState::new(&data);
        let decoded = param.decode(&mut state).unwrap();
        assert_eq!(decoded.value, Value::String("default".to_string()));
        assert!(decoded.diagnostics.is_empty());
    }

    #[test]
    fn test_display() {
        let mut param = value_v("DOP.uint8");
        param.set_physical_default_value_raw("5");
        assert_eq!(
            param.to_string(),
            "ValueParameter(short_name='v', physical_default_value_raw='5', \
             dop_ref=OdxLinkRef(ref_id='DOP.uint8', ref_doc='ECU'))"
        );
    }
}

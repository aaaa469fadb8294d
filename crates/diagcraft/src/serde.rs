//! JSON-deserializable schema definitions.
//!
//! These types describe diag layers, converters and parameters in a plain
//! shape that applications can ship as JSON and convert into a [`Database`]
//! with [`TryFrom`]. Conversion only builds the objects; call
//! [`Database::resolve`] afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bits::ByteOrder,
    converter::{CompuMethod, Converter, DiagCodedType, TextTableEntry},
    diaglayer::{Database, DiagLayer},
    errors::ResolveError,
    odxlink::{OdxLinkId, OdxLinkRef},
    parameters::{ConstantParameter, DopReference, Parameter, ParameterBase, ValueParameter},
    structure::Structure,
    value::BaseDataType,
};

/// Errors produced when turning definitions into schema objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    /// A parameter names neither `dop_ref` nor `dop_snref`.
    #[error("parameter '{0}' has no converter reference")]
    MissingDopReference(String),
    /// A parameter names both `dop_ref` and `dop_snref`.
    #[error("parameter '{0}' has both an identifier and a short-name converter reference")]
    AmbiguousDopReference(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Top-level definition: every diag layer of the schema.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseDef {
    pub layers: Vec<DiagLayerDef>,
}

/// An odxlink id or reference.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OdxLinkDef {
    pub id: String,
    /// Document fragment; defaults to empty.
    #[serde(default)]
    pub doc: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiagLayerDef {
    pub short_name: String,
    pub id: OdxLinkDef,
    #[serde(default)]
    pub parent_refs: Vec<OdxLinkDef>,
    #[serde(default)]
    pub converters: Vec<ConverterDef>,
    #[serde(default)]
    pub structures: Vec<StructureDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum BaseDataTypeDef {
    #[serde(rename = "A_INT32")]
    AInt32,
    #[serde(rename = "A_UINT32")]
    AUInt32,
    #[serde(rename = "A_FLOAT32")]
    AFloat32,
    #[serde(rename = "A_FLOAT64")]
    AFloat64,
    #[serde(rename = "A_ASCIISTRING")]
    AAsciiString,
    #[serde(rename = "A_UTF8STRING")]
    AUtf8String,
    #[serde(rename = "A_BYTEFIELD")]
    AByteField,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum ByteOrderDef {
    #[default]
    HighLow,
    LowHigh,
}

/// Standard-length coded type.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CodedTypeDef {
    pub base_data_type: BaseDataTypeDef,
    pub bit_length: usize,
    #[serde(default)]
    pub byte_order: ByteOrderDef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TextTableEntryDef {
    pub internal: i64,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(tag = "type")]
pub enum CompuMethodDef {
    #[default]
    Identical,
    Linear { factor: f64, offset: f64 },
    TextTable { entries: Vec<TextTableEntryDef> },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConverterDef {
    pub short_name: String,
    pub id: OdxLinkDef,
    pub coded_type: CodedTypeDef,
    pub physical_type: BaseDataTypeDef,
    #[serde(default)]
    pub compu_method: CompuMethodDef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StructureDef {
    pub short_name: String,
    pub parameters: Vec<ParameterDef>,
}

/// Description of one parameter. Exactly one of `dop_ref` and `dop_snref` must be set.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParameterDef {
    pub short_name: String,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub semantic: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub byte_position: Option<usize>,
    #[serde(default)]
    pub bit_position: Option<usize>,
    #[serde(default)]
    pub dop_ref: Option<OdxLinkDef>,
    #[serde(default)]
    pub dop_snref: Option<String>,
    pub kind: ParameterKindDef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ParameterKindDef {
    #[serde(rename = "PHYS-CONST")]
    PhysConst { physical_constant_value: String },
    #[serde(rename = "VALUE")]
    Value {
        #[serde(default)]
        physical_default_value: Option<String>,
    },
}

impl From<OdxLinkDef> for OdxLinkId {
    fn from(value: OdxLinkDef) -> Self {
        OdxLinkId::new(value.id, value.doc)
    }
}

impl From<OdxLinkDef> for OdxLinkRef {
    fn from(value: OdxLinkDef) -> Self {
        OdxLinkRef::new(value.id, value.doc)
    }
}

impl From<BaseDataTypeDef> for BaseDataType {
    fn from(value: BaseDataTypeDef) -> Self {
        match value {
            BaseDataTypeDef::AInt32 => BaseDataType::AInt32,
            BaseDataTypeDef::AUInt32 => BaseDataType::AUInt32,
            BaseDataTypeDef::AFloat32 => BaseDataType::AFloat32,
            BaseDataTypeDef::AFloat64 => BaseDataType::AFloat64,
            BaseDataTypeDef::AAsciiString => BaseDataType::AAsciiString,
            BaseDataTypeDef::AUtf8String => BaseDataType::AUtf8String,
            BaseDataTypeDef::AByteField => BaseDataType::AByteField,
        }
    }
}

impl From<ByteOrderDef> for ByteOrder {
    fn from(value: ByteOrderDef) -> Self {
        match value {
            ByteOrderDef::HighLow => ByteOrder::HighLow,
            ByteOrderDef::LowHigh => ByteOrder::LowHigh,
        }
    }
}

impl From<CodedTypeDef> for DiagCodedType {
    fn from(value: CodedTypeDef) -> Self {
        let mut coded = DiagCodedType::new(value.base_data_type.into(), value.bit_length);
        coded.set_byte_order(value.byte_order.into());
        coded
    }
}

impl From<CompuMethodDef> for CompuMethod {
    fn from(value: CompuMethodDef) -> Self {
        match value {
            CompuMethodDef::Identical => CompuMethod::Identical,
            CompuMethodDef::Linear { factor, offset } => CompuMethod::Linear { factor, offset },
            CompuMethodDef::TextTable { entries } => CompuMethod::TextTable(
                entries
                    .into_iter()
                    .map(|e| TextTableEntry {
                        internal: e.internal,
                        text: e.text,
                    })
                    .collect(),
            ),
        }
    }
}

impl From<ConverterDef> for Converter {
    fn from(value: ConverterDef) -> Self {
        let mut converter = Converter::new(
            value.short_name,
            value.id.into(),
            value.coded_type.into(),
            value.physical_type.into(),
        );
        converter.set_compu_method(value.compu_method.into());
        converter
    }
}

impl TryFrom<ParameterDef> for Parameter {
    type Error = DefinitionError;

    fn try_from(value: ParameterDef) -> Result<Self, Self::Error> {
        let dop = match (value.dop_ref, value.dop_snref) {
            (Some(dop_ref), None) => DopReference::Id(dop_ref.into()),
            (None, Some(name)) => DopReference::Name(name),
            (None, None) => return Err(DefinitionError::MissingDopReference(value.short_name)),
            (Some(_), Some(_)) => {
                return Err(DefinitionError::AmbiguousDopReference(value.short_name));
            }
        };

        let mut base = ParameterBase::new(value.short_name, dop);
        base.long_name = value.long_name;
        base.semantic = value.semantic;
        base.description = value.description;
        base.byte_position = value.byte_position;
        base.bit_position = value.bit_position;

        Ok(match value.kind {
            ParameterKindDef::PhysConst {
                physical_constant_value,
            } => ConstantParameter::new(base, physical_constant_value).into(),
            ParameterKindDef::Value {
                physical_default_value,
            } => {
                let mut parameter = ValueParameter::new(base);
                parameter.physical_default_value_raw = physical_default_value;
                parameter.into()
            }
        })
    }
}

impl TryFrom<StructureDef> for Structure {
    type Error = DefinitionError;

    fn try_from(value: StructureDef) -> Result<Self, Self::Error> {
        let parameters = value
            .parameters
            .into_iter()
            .map(Parameter::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Structure::new(value.short_name, parameters))
    }
}

impl TryFrom<DiagLayerDef> for DiagLayer {
    type Error = DefinitionError;

    fn try_from(value: DiagLayerDef) -> Result<Self, Self::Error> {
        let mut layer = DiagLayer::new(value.short_name, value.id.into());
        layer.parent_refs = value.parent_refs.into_iter().map(Into::into).collect();
        layer.converters = value
            .converters
            .into_iter()
            .map(|c| Arc::new(Converter::from(c)))
            .collect();
        layer.structures = value
            .structures
            .into_iter()
            .map(Structure::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(layer)
    }
}

impl TryFrom<DatabaseDef> for Database {
    type Error = DefinitionError;

    fn try_from(value: DatabaseDef) -> Result<Self, Self::Error> {
        let layers = value
            .layers
            .into_iter()
            .map(DiagLayer::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Database::new(layers)?)
    }
}

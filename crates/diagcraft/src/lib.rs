//! # diagcraft
//!
//! A bit-level codec for diagnostic protocol parameters.
//!
//! Schemas are loaded as a graph of diag layers, converters and parameters whose
//! references are only bound once the whole graph exists. [`Database::resolve`]
//! binds identifier references first and short-name references second. After
//! that, parameters encode typed values into a coded message and decode them
//! back out of one.
//!
//! Constant parameters carry a value fixed by the schema. Encoding refuses
//! caller values that contradict it; decoding reports a mismatching wire value
//! as a [`state::DecodeDiagnostic`] and keeps going.
//!
//! ## Example
//!
//! ```
//! use std::{collections::BTreeMap, sync::Arc};
//!
//! use diagcraft::converter::{Converter, DiagCodedType};
//! use diagcraft::diaglayer::{Database, DiagLayer};
//! use diagcraft::odxlink::{OdxLinkId, OdxLinkRef};
//! use diagcraft::parameters::{ConstantParameter, DopReference, ParameterBase};
//! use diagcraft::state::DecodeMode;
//! use diagcraft::structure::Structure;
//! use diagcraft::value::{BaseDataType, Value};
//!
//! let mut layer = DiagLayer::new("ecu", OdxLinkId::new("DL.ecu", "ECU"));
//! layer.converters.push(Arc::new(Converter::new(
//!     "uint8",
//!     OdxLinkId::new("DOP.uint8", "ECU"),
//!     DiagCodedType::new(BaseDataType::AUInt32, 8),
//!     BaseDataType::AUInt32,
//! )));
//!
//! let p = ConstantParameter::new(
//!     ParameterBase::new("p", DopReference::Id(OdxLinkRef::new("DOP.uint8", "ECU"))),
//!     "42",
//! );
//! layer.structures.push(Structure::new("request", vec![p.into()]));
//!
//! let mut db = Database::new(vec![layer]).unwrap();
//! db.resolve().unwrap();
//!
//! let request = db.layer("ecu").unwrap().structure("request").unwrap();
//! assert_eq!(request.encode(BTreeMap::new()).unwrap(), vec![0x2a]);
//!
//! let decoded = request.decode(&[0x07], DecodeMode::Lenient).unwrap();
//! assert_eq!(decoded.values["p"], Value::UInt(7));
//! assert_eq!(decoded.diagnostics.len(), 1);
//! ```

pub mod bits;
pub mod converter;
pub mod diaglayer;
pub mod errors;
pub mod odxlink;
pub mod parameters;
#[cfg(feature = "serde")]
pub mod serde;
pub mod state;
pub mod structure;
pub mod value;

pub use diaglayer::Database;

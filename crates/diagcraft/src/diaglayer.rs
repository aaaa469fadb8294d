//! Diag layers, their short-name scopes, and the database that runs the
//! resolution passes over all of them.
//!
//! Resolution happens in two passes over the whole database:
//!
//! 1. [`Database::resolve_identifier_refs`] binds every odxlink reference:
//!    parent layers and converters referenced by id.
//! 2. [`Database::resolve_name_refs`] binds every short-name reference against
//!    the scope of the layer owning the parameter. A scope contains the
//!    layer's own converters and those of its parents, which are only known
//!    once pass 1 has run.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
};

use crate::{
    converter::Converter,
    errors::ResolveError,
    odxlink::{LinkRegistry, OdxLinkId, OdxLinkRef, SchemaObject},
    structure::Structure,
};

/// Position of a layer in its [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerIndex(pub usize);

#[derive(Debug, Clone)]
pub struct DiagLayer {
    pub short_name: String,
    pub odx_id: OdxLinkId,
    /// Layers whose converters are visible by short name from this one.
    pub parent_refs: Vec<OdxLinkRef>,
    pub converters: Vec<Arc<Converter>>,
    pub structures: Vec<Structure>,
    parents: Vec<LayerIndex>,
}

impl DiagLayer {
    pub fn new(short_name: impl Into<String>, odx_id: OdxLinkId) -> Self {
        Self {
            short_name: short_name.into(),
            odx_id,
            parent_refs: Vec::new(),
            converters: Vec::new(),
            structures: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Resolved parent layers, empty before the identifier pass.
    pub fn parents(&self) -> &[LayerIndex] {
        &self.parents
    }

    pub fn structure(&self, short_name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.short_name == short_name)
    }

    pub fn converter(&self, short_name: &str) -> Option<&Arc<Converter>> {
        self.converters.iter().find(|c| c.short_name == short_name)
    }

    fn resolve_identifier_refs(&mut self, registry: &LinkRegistry, errors: &mut Vec<ResolveError>) {
        self.parents.clear();
        for parent_ref in &self.parent_refs {
            match registry.resolve_layer(parent_ref) {
                Some(index) => self.parents.push(index),
                None => errors.push(ResolveError::UnresolvedReference {
                    object: self.short_name.clone(),
                    reference: parent_ref.to_string(),
                }),
            }
        }

        for structure in &mut self.structures {
            structure.resolve_identifier_refs(registry, errors);
        }
    }
}

/// Converters visible by short name from one diag layer.
#[derive(Debug, Clone, Default)]
pub struct DiagLayerScope {
    converters: BTreeMap<String, Arc<Converter>>,
}

impl DiagLayerScope {
    /// Builds a scope; for duplicate short names the first converter wins.
    pub fn from_converters(converters: impl IntoIterator<Item = Arc<Converter>>) -> Self {
        let mut scope = Self::default();
        scope.extend(converters);
        scope
    }

    fn extend(&mut self, converters: impl IntoIterator<Item = Arc<Converter>>) {
        for converter in converters {
            self.converters
                .entry(converter.short_name.clone())
                .or_insert(converter);
        }
    }

    pub fn find_converter(&self, short_name: &str) -> Option<&Arc<Converter>> {
        self.converters.get(short_name)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

/// All diag layers of a schema together with their link registry.
#[derive(Debug, Clone)]
pub struct Database {
    layers: Vec<DiagLayer>,
    registry: LinkRegistry,
}

impl Database {
    /// Takes ownership of the loaded layers and registers every identifiable object.
    pub fn new(layers: Vec<DiagLayer>) -> Result<Self, ResolveError> {
        let mut registry = LinkRegistry::new();

        for (index, layer) in layers.iter().enumerate() {
            registry.insert(layer.odx_id.clone(), SchemaObject::Layer(LayerIndex(index)))?;
            for converter in &layer.converters {
                registry.insert(
                    converter.odx_id.clone(),
                    SchemaObject::Converter(converter.clone()),
                )?;
            }
        }

        log::debug!(
            "registered {} odxlink objects from {} diag layers",
            registry.len(),
            layers.len()
        );

        Ok(Self { layers, registry })
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn layers(&self) -> &[DiagLayer] {
        &self.layers
    }

    pub fn layer(&self, short_name: &str) -> Option<&DiagLayer> {
        self.layers.iter().find(|l| l.short_name == short_name)
    }

    pub fn layer_at(&self, index: LayerIndex) -> Option<&DiagLayer> {
        self.layers.get(index.0)
    }

    /// Runs both resolution passes in order and returns every error found.
    ///
    /// Parameters that failed stay unresolved and refuse to encode or decode;
    /// all other parameters are usable.
    pub fn resolve(&mut self) -> Result<(), Vec<ResolveError>> {
        let mut errors = self.resolve_identifier_refs();
        errors.extend(self.resolve_name_refs());

        if errors.is_empty() {
            Ok(())
        } else {
            for err in &errors {
                log::debug!("resolution failed: {err}");
            }
            Err(errors)
        }
    }

    /// First pass: binds every odxlink reference of every layer.
    pub fn resolve_identifier_refs(&mut self) -> Vec<ResolveError> {
        let mut errors = Vec::new();
        for layer in &mut self.layers {
            layer.resolve_identifier_refs(&self.registry, &mut errors);
        }
        errors
    }

    /// Second pass: binds every short-name reference against its layer's scope.
    pub fn resolve_name_refs(&mut self) -> Vec<ResolveError> {
        let mut errors = Vec::new();
        for index in 0..self.layers.len() {
            let scope = self.scope(LayerIndex(index));
            for structure in &mut self.layers[index].structures {
                structure.resolve_name_refs(&scope, &mut errors);
            }
        }
        errors
    }

    /// Converters visible from the layer at `index`: its own first, then its
    /// parents' in breadth-first order. Parents are only followed once resolved.
    pub fn scope(&self, index: LayerIndex) -> DiagLayerScope {
        let mut scope = DiagLayerScope::default();
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([index]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(layer) = self.layer_at(current) else {
                continue;
            };

            scope.extend(layer.converters.iter().cloned());
            queue.extend(layer.parents.iter().copied());
        }

        scope
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{
        converter::DiagCodedType,
        parameters::{ConstantParameter, DopReference, Parameter, ParameterBase},
        state::DecodeMode,
        value::{BaseDataType, Value},
    };

    use super::*;

    fn converter(short_name: &str, bit_length: usize) -> Arc<Converter> {
        Arc::new(Converter::new(
            short_name,
            OdxLinkId::new(format!("DOP.{short_name}"), "ECU"),
            DiagCodedType::new(BaseDataType::AUInt32, bit_length),
            BaseDataType::AUInt32,
        ))
    }

    fn constant(short_name: &str, dop: DopReference, raw: &str) -> Parameter {
        ConstantParameter::new(ParameterBase::new(short_name, dop), raw).into()
    }

    /// A base layer owning `uint8` and a variant that inherits it and refers to it by name.
    fn inherited_database() -> Database {
        let mut base = DiagLayer::new("base", OdxLinkId::new("DL.base", "ECU"));
        base.converters.push(converter("uint8", 8));

        let mut variant = DiagLayer::new("variant", OdxLinkId::new("DL.variant", "ECU"));
        variant.parent_refs.push(OdxLinkRef::new("DL.base", "ECU"));
        variant.structures.push(Structure::new(
            "request",
            vec![constant("p", DopReference::Name("uint8".to_string()), "42")],
        ));

        Database::new(vec![base, variant]).unwrap()
    }

    #[test]
    fn test_resolve_inherited_name() {
        let mut db = inherited_database();
        db.resolve().unwrap();

        let variant = db.layer("variant").unwrap();
        assert_eq!(variant.parents(), &[LayerIndex(0)]);

        let request = variant.structure("request").unwrap();
        assert!(request.parameter("p").unwrap().is_resolved());
        assert_eq!(request.encode(BTreeMap::new()).unwrap(), vec![0x2a]);
    }

    #[test]
    fn test_name_pass_before_identifier_pass_fails() {
        let mut db = inherited_database();

        let errors = db.resolve_name_refs();
        assert_eq!(
            errors,
            vec![ResolveError::UnresolvedReference {
                object: "p".to_string(),
                reference: "'uint8'".to_string(),
            }]
        );
        let request = db.layer("variant").unwrap().structure("request").unwrap();
        assert!(!request.parameter("p").unwrap().is_resolved());

        assert!(db.resolve_identifier_refs().is_empty());
        assert!(db.resolve_name_refs().is_empty());
        let request = db.layer("variant").unwrap().structure("request").unwrap();
        assert!(request.parameter("p").unwrap().is_resolved());
    }

    #[test]
    fn test_own_converter_shadows_parent() {
        let mut base = DiagLayer::new("base", OdxLinkId::new("DL.base", "ECU"));
        base.converters.push(converter("value", 8));

        let mut variant = DiagLayer::new("variant", OdxLinkId::new("DL.variant", "ECU"));
        variant.parent_refs.push(OdxLinkRef::new("DL.base", "ECU"));
        variant.converters.push(Arc::new(Converter::new(
            "value",
            OdxLinkId::new("DOP.variant.value", "ECU"),
            DiagCodedType::new(BaseDataType::AUInt32, 16),
            BaseDataType::AUInt32,
        )));

        let mut db = Database::new(vec![base, variant]).unwrap();
        db.resolve().unwrap();

        let scope = db.scope(LayerIndex(1));
        assert_eq!(scope.len(), 1);
        assert_eq!(
            scope.find_converter("value").unwrap().diag_coded_type.bit_length,
            16
        );
    }

    #[test]
    fn test_errors_are_collected_per_parameter() {
        let mut layer = DiagLayer::new("ecu", OdxLinkId::new("DL.ecu", "ECU"));
        layer.converters.push(converter("uint8", 8));
        layer.parent_refs.push(OdxLinkRef::new("DL.missing", "ECU"));
        layer.structures.push(Structure::new(
            "request",
            vec![
                constant("good", DopReference::Name("uint8".to_string()), "1"),
                constant("bad_ref", DopReference::Id(OdxLinkRef::new("DOP.nope", "ECU")), "1"),
                constant("bad_text", DopReference::Name("uint8".to_string()), "x"),
            ],
        ));

        let mut db = Database::new(vec![layer]).unwrap();
        let errors = db.resolve().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(
            &errors[0],
            ResolveError::UnresolvedReference { object, .. } if object == "ecu"
        ));
        assert!(matches!(
            &errors[1],
            ResolveError::UnresolvedReference { object, .. } if object == "bad_ref"
        ));
        assert!(matches!(
            &errors[2],
            ResolveError::MalformedConstantValue { parameter, .. } if parameter == "bad_text"
        ));

        let request = db.layer("ecu").unwrap().structure("request").unwrap();
        assert!(request.parameter("good").unwrap().is_resolved());
        assert!(!request.parameter("bad_ref").unwrap().is_resolved());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut a = DiagLayer::new("a", OdxLinkId::new("DL.a", "ECU"));
        a.converters.push(converter("uint8", 8));
        let mut b = DiagLayer::new("b", OdxLinkId::new("DL.b", "ECU"));
        b.converters.push(converter("uint8", 8));

        assert_eq!(
            Database::new(vec![a, b]).unwrap_err(),
            ResolveError::DuplicateLinkId(OdxLinkId::new("DOP.uint8", "ECU"))
        );
    }

    #[test]
    fn test_cyclic_parents_terminate() {
        let mut a = DiagLayer::new("a", OdxLinkId::new("DL.a", "ECU"));
        a.parent_refs.push(OdxLinkRef::new("DL.b", "ECU"));
        a.converters.push(converter("uint8", 8));
        let mut b = DiagLayer::new("b", OdxLinkId::new("DL.b", "ECU"));
        b.parent_refs.push(OdxLinkRef::new("DL.a", "ECU"));

        let mut db = Database::new(vec![a, b]).unwrap();
        db.resolve().unwrap();
        assert!(db.scope(LayerIndex(1)).find_converter("uint8").is_some());
    }

    #[test]
    fn test_resolved_database_decodes() {
        let mut db = inherited_database();
        db.resolve().unwrap();
        let request = db.layer("variant").unwrap().structure("request").unwrap();

        let decoded = request.decode(&[0x07], DecodeMode::Lenient).unwrap();
        assert_eq!(decoded.values["p"], Value::UInt(7));
        assert_eq!(decoded.diagnostics.len(), 1);
        assert_eq!(decoded.diagnostics[0].expected, Value::UInt(42));
    }
}

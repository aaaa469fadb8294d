//! Identifier references and the registry they are resolved against.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{converter::Converter, diaglayer::LayerIndex, errors::ResolveError};

/// Stable identifier of a schema object: a local id qualified by the document it lives in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OdxLinkId {
    pub local_id: String,
    pub doc_fragment: String,
}

impl OdxLinkId {
    pub fn new(local_id: impl Into<String>, doc_fragment: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            doc_fragment: doc_fragment.into(),
        }
    }
}

impl fmt::Display for OdxLinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in '{}'", self.local_id, self.doc_fragment)
    }
}

/// A reference to a schema object by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdxLinkRef {
    pub ref_id: String,
    pub ref_doc: String,
}

impl OdxLinkRef {
    pub fn new(ref_id: impl Into<String>, ref_doc: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            ref_doc: ref_doc.into(),
        }
    }

    pub fn to_link_id(&self) -> OdxLinkId {
        OdxLinkId::new(self.ref_id.clone(), self.ref_doc.clone())
    }
}

impl From<&OdxLinkId> for OdxLinkRef {
    fn from(id: &OdxLinkId) -> Self {
        OdxLinkRef::new(id.local_id.clone(), id.doc_fragment.clone())
    }
}

impl fmt::Display for OdxLinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OdxLinkRef(ref_id='{}', ref_doc='{}')",
            self.ref_id, self.ref_doc
        )
    }
}

/// An object reachable through the registry.
#[derive(Debug, Clone)]
pub enum SchemaObject {
    Converter(Arc<Converter>),
    Layer(LayerIndex),
}

/// Table of every identifiable schema object.
///
/// Filled while the schema is loaded; entries are never removed or rebound.
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    entries: BTreeMap<OdxLinkId, SchemaObject>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under `id`. Fails if the id is already taken.
    pub fn insert(&mut self, id: OdxLinkId, object: SchemaObject) -> Result<(), ResolveError> {
        if self.entries.contains_key(&id) {
            return Err(ResolveError::DuplicateLinkId(id));
        }

        self.entries.insert(id, object);
        Ok(())
    }

    pub fn get(&self, id: &OdxLinkId) -> Option<&SchemaObject> {
        self.entries.get(id)
    }

    /// Looks up a converter. References to objects of another kind resolve to `None`.
    pub fn resolve_converter(&self, reference: &OdxLinkRef) -> Option<&Arc<Converter>> {
        match self.get(&reference.to_link_id())? {
            SchemaObject::Converter(converter) => Some(converter),
            SchemaObject::Layer(_) => None,
        }
    }

    pub fn resolve_layer(&self, reference: &OdxLinkRef) -> Option<LayerIndex> {
        match self.get(&reference.to_link_id())? {
            SchemaObject::Layer(index) => Some(*index),
            SchemaObject::Converter(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{converter::DiagCodedType, value::BaseDataType};

    use super::*;

    fn converter(id: &str) -> Arc<Converter> {
        Arc::new(Converter::new(
            id,
            OdxLinkId::new(id, "ECU"),
            DiagCodedType::new(BaseDataType::AUInt32, 8),
            BaseDataType::AUInt32,
        ))
    }

    #[test]
    fn test_resolve_by_kind() {
        let mut registry = LinkRegistry::new();
        let dop = converter("DOP.a");
        registry
            .insert(dop.odx_id.clone(), SchemaObject::Converter(dop.clone()))
            .unwrap();
        registry
            .insert(OdxLinkId::new("DL.ecu", "ECU"), SchemaObject::Layer(LayerIndex(0)))
            .unwrap();

        let dop_ref = OdxLinkRef::new("DOP.a", "ECU");
        let layer_ref = OdxLinkRef::new("DL.ecu", "ECU");

        assert!(Arc::ptr_eq(registry.resolve_converter(&dop_ref).unwrap(), &dop));
        assert_eq!(registry.resolve_layer(&layer_ref), Some(LayerIndex(0)));
        assert!(registry.resolve_converter(&layer_ref).is_none());
        assert!(registry.resolve_layer(&dop_ref).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_doc_fragment_is_part_of_identity() {
        let mut registry = LinkRegistry::new();
        let dop = converter("DOP.a");
        registry
            .insert(dop.odx_id.clone(), SchemaObject::Converter(dop))
            .unwrap();

        assert!(registry
            .resolve_converter(&OdxLinkRef::new("DOP.a", "OTHER"))
            .is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = LinkRegistry::new();
        let first = converter("DOP.a");
        let second = converter("DOP.a");
        registry
            .insert(first.odx_id.clone(), SchemaObject::Converter(first.clone()))
            .unwrap();

        assert_eq!(
            registry.insert(second.odx_id.clone(), SchemaObject::Converter(second)),
            Err(ResolveError::DuplicateLinkId(OdxLinkId::new("DOP.a", "ECU")))
        );
        assert!(Arc::ptr_eq(
            registry
                .resolve_converter(&OdxLinkRef::new("DOP.a", "ECU"))
                .unwrap(),
            &first
        ));
    }
}

//! Reference Registry
//!
//! Arena of named definitions and enumerations. A definition slot is
//! reserved under its name *before* its body is read, so a definition that
//! refers to itself (directly or through others) resolves to the slot being
//! filled instead of recursing forever. Nodes point into the arena by index;
//! there are no reference-counted cycles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::schema::{DefId, EnumDef, EnumId, LayoutMode, NodeKind, SchemaNode};

/// A named definition
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    /// Document the definition was read from
    pub document: PathBuf,
    pub node: SchemaNode,
}

/// A node with references followed to their target
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub node: &'a SchemaNode,
    /// Layout declared at the reference site if any, else the target's
    pub layout: LayoutMode,
    /// Definition the node came from, if it was reached through a reference
    pub definition: Option<DefId>,
}

/// The main definition registry
#[derive(Debug, Default)]
pub struct ReferenceRegistry {
    definitions: Vec<Definition>,
    by_name: HashMap<String, DefId>,
    enums: Vec<EnumDef>,
    enums_by_name: HashMap<String, EnumId>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a definition by name
    pub fn lookup(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    /// Reserve a slot for `name`, or return the existing one.
    ///
    /// The boolean is `true` when the slot was newly allocated and its body
    /// still has to be read and passed to [`populate`](Self::populate).
    pub fn reserve(&mut self, name: &str, document: &Path) -> (DefId, bool) {
        if let Some(id) = self.lookup(name) {
            return (id, false);
        }

        let id = DefId(self.definitions.len());
        self.definitions.push(Definition {
            name: name.to_string(),
            document: document.to_path_buf(),
            node: SchemaNode::placeholder(),
        });
        self.by_name.insert(name.to_string(), id);
        (id, true)
    }

    /// Fill a reserved slot
    pub fn populate(&mut self, id: DefId, node: SchemaNode) {
        if let Some(def) = self.definitions.get_mut(id.0) {
            def.node = node;
        }
    }

    pub fn definition(&self, id: DefId) -> &Definition {
        &self.definitions[id.0]
    }

    /// All definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = (DefId, &Definition)> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (DefId(i), d))
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    /// Register a named enum once; later calls with the same name return the first
    pub fn register_enum(&mut self, def: EnumDef) -> EnumId {
        if let Some(name) = &def.name {
            if let Some(id) = self.enums_by_name.get(name) {
                return *id;
            }
            let id = EnumId(self.enums.len());
            self.enums_by_name.insert(name.clone(), id);
            self.enums.push(def);
            return id;
        }

        let id = EnumId(self.enums.len());
        self.enums.push(def);
        id
    }

    pub fn lookup_enum(&self, name: &str) -> Option<EnumId> {
        self.enums_by_name.get(name).copied()
    }

    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        &self.enums[id.0]
    }

    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &EnumDef)> {
        self.enums.iter().enumerate().map(|(i, e)| (EnumId(i), e))
    }

    /// Follow references from `node` to a concrete node
    pub fn resolve<'a>(&'a self, node: &'a SchemaNode) -> Resolved<'a> {
        let mut current = node;
        let mut layout = node.layout;
        let mut definition = None;

        // A chain longer than the arena can only be a reference cycle
        for _ in 0..=self.definitions.len() {
            match current.kind {
                NodeKind::Reference(id) => {
                    definition = Some(id);
                    current = &self.definitions[id.0].node;
                    layout = layout.or(current.layout);
                }
                _ => break,
            }
        }

        Resolved {
            node: current,
            layout: layout.unwrap_or_default(),
            definition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumValue, Property, ScalarKind};

    #[test]
    fn test_reserve_is_idempotent() {
        let mut registry = ReferenceRegistry::new();
        let (a, fresh_a) = registry.reserve("Reward", Path::new("quest.json"));
        let (b, fresh_b) = registry.reserve("Reward", Path::new("other.json"));
        assert!(fresh_a);
        assert!(!fresh_b);
        assert_eq!(a, b);
        assert_eq!(registry.definition_count(), 1);
    }

    #[test]
    fn test_self_reference_resolves_to_same_slot() {
        let mut registry = ReferenceRegistry::new();
        let (id, _) = registry.reserve("Node", Path::new("tree.json"));
        let node = SchemaNode::object(vec![
            Property::new("Name", SchemaNode::scalar(ScalarKind::String)),
            Property::new(
                "Children",
                SchemaNode::array(SchemaNode::new(NodeKind::Reference(id))),
            ),
        ]);
        registry.populate(id, node);

        let children = &registry.definition(id).node.properties()[1].node;
        match &children.kind {
            NodeKind::Array { element } => {
                let resolved = registry.resolve(element);
                assert_eq!(resolved.definition, Some(id));
                assert_eq!(resolved.node.properties().len(), 2);
            }
            other => panic!("Expected Array, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_layout_override() {
        let mut registry = ReferenceRegistry::new();
        let (id, _) = registry.reserve("Effect", Path::new("skill.json"));
        registry.populate(
            id,
            SchemaNode::object(vec![]).with_layout(LayoutMode::MultiRow),
        );

        let plain = SchemaNode::new(NodeKind::Reference(id));
        assert_eq!(registry.resolve(&plain).layout, LayoutMode::MultiRow);

        let overridden = SchemaNode::new(NodeKind::Reference(id)).with_layout(LayoutMode::SingleColumn);
        assert_eq!(registry.resolve(&overridden).layout, LayoutMode::SingleColumn);
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let mut registry = ReferenceRegistry::new();
        let (a, _) = registry.reserve("A", Path::new("x.json"));
        let (b, _) = registry.reserve("B", Path::new("x.json"));
        registry.populate(a, SchemaNode::new(NodeKind::Reference(b)));
        registry.populate(b, SchemaNode::new(NodeKind::Reference(a)));

        let start = SchemaNode::new(NodeKind::Reference(a));
        let resolved = registry.resolve(&start);
        assert!(matches!(resolved.node.kind, NodeKind::Reference(_)));
    }

    #[test]
    fn test_named_enums_are_shared_anonymous_are_not() {
        let mut registry = ReferenceRegistry::new();
        let named = |name: &str| EnumDef {
            name: Some(name.to_string()),
            kind: ScalarKind::String,
            values: vec![("Fire".to_string(), EnumValue::Text("Fire".to_string()))],
        };
        let first = registry.register_enum(named("Element"));
        let second = registry.register_enum(named("Element"));
        assert_eq!(first, second);

        let anon = EnumDef {
            name: None,
            kind: ScalarKind::String,
            values: vec![],
        };
        let x = registry.register_enum(anon.clone());
        let y = registry.register_enum(anon);
        assert_ne!(x, y);
    }
}

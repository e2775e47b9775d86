//! Strongly-typed view of the type-system manifest.
//!
//! Mirrors the assembly format emitted by the binding generator: a map of
//! fully-qualified names to classes, interfaces and enums. Everything here is
//! read-only once loaded; the compiler only ever borrows it.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ManifestError;

// ————————————————————————————————————————————————————————————————————————————
// TYPE REFERENCES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Date,
    Json,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Array,
    Map,
}

/// What kind of value a property or parameter holds.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(Primitive),
    /// Class, interface or enum, looked up in the [`TypeSystem`].
    Named(String),
    Union(Vec<TypeRef>),
    Collection {
        kind: CollectionKind,
        element: Box<TypeRef>,
    },
    /// A reference shape the engine does not understand (e.g. intersections).
    Unsupported(Value),
}

impl TypeRef {
    pub fn named(fqn: impl Into<String>) -> Self {
        TypeRef::Named(fqn.into())
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Collection { kind: CollectionKind::Array, element: Box::new(element) }
    }

    pub fn map_of(element: TypeRef) -> Self {
        TypeRef::Collection { kind: CollectionKind::Map, element: Box::new(element) }
    }

    pub fn fqn(&self) -> Option<&str> {
        match self {
            TypeRef::Named(fqn) => Some(fqn),
            _ => None,
        }
    }

    /// Classify a raw manifest reference. Never fails: unknown shapes become
    /// [`TypeRef::Unsupported`] so a single odd property cannot sink the
    /// whole manifest.
    pub fn from_value(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return TypeRef::Unsupported(raw.clone());
        };
        if let Some(p) = obj.get("primitive").and_then(Value::as_str) {
            let prim = match p {
                "string" => Primitive::String,
                "number" => Primitive::Number,
                "boolean" => Primitive::Boolean,
                "date" => Primitive::Date,
                "json" => Primitive::Json,
                "any" => Primitive::Any,
                _ => return TypeRef::Unsupported(raw.clone()),
            };
            return TypeRef::Primitive(prim);
        }
        if let Some(fqn) = obj.get("fqn").and_then(Value::as_str) {
            return TypeRef::Named(fqn.to_string());
        }
        if let Some(coll) = obj.get("collection") {
            let kind = match coll.get("kind").and_then(Value::as_str) {
                Some("array") => CollectionKind::Array,
                Some("map") => CollectionKind::Map,
                _ => return TypeRef::Unsupported(raw.clone()),
            };
            let Some(element) = coll.get("elementtype") else {
                return TypeRef::Unsupported(raw.clone());
            };
            return TypeRef::Collection { kind, element: Box::new(TypeRef::from_value(element)) };
        }
        if let Some(types) = obj.get("union").and_then(|u| u.get("types")).and_then(Value::as_array) {
            return TypeRef::Union(types.iter().map(TypeRef::from_value).collect());
        }
        TypeRef::Unsupported(raw.clone())
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(TypeRef::from_value(&raw))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE DEFINITIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Docs {
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub docs: Docs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Initializer {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassType {
    pub fqn: String,
    #[serde(default)]
    pub base: Option<String>,
    /// Implemented interfaces; their properties are inherited like the base's.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub initializer: Option<Initializer>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub docs: Docs,
}

impl ClassType {
    /// Parameter at `index` of the initializer, if there is one.
    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.initializer.as_ref()?.parameters.get(index)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceType {
    pub fqn: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub docs: Docs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumMember {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumType {
    pub fqn: String,
    #[serde(default)]
    pub members: Vec<EnumMember>,
    #[serde(default)]
    pub docs: Docs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDef {
    Class(ClassType),
    Interface(InterfaceType),
    Enum(EnumType),
}

impl TypeDef {
    pub fn fqn(&self) -> &str {
        match self {
            TypeDef::Class(c) => &c.fqn,
            TypeDef::Interface(i) => &i.fqn,
            TypeDef::Enum(e) => &e.fqn,
        }
    }

    pub fn docs(&self) -> &Docs {
        match self {
            TypeDef::Class(c) => &c.docs,
            TypeDef::Interface(i) => &i.docs,
            TypeDef::Enum(e) => &e.docs,
        }
    }

    /// Diagnostic kind label.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDef::Class(_) => "class",
            TypeDef::Interface(_) => "interface",
            TypeDef::Enum(_) => "enum",
        }
    }
}

/// One manifest file.
#[derive(Debug, Clone, Deserialize)]
pub struct Assembly {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub types: IndexMap<String, TypeDef>,
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE SYSTEM
// ————————————————————————————————————————————————————————————————————————————

/// Every type from every loaded assembly, in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct TypeSystem {
    types: IndexMap<String, TypeDef>,
    origins: IndexMap<String, String>,
}

/// Flattened property list of a class or interface, plus any problems found
/// while walking its ancestry.
#[derive(Debug, Default)]
pub struct Flattened<'a> {
    pub properties: IndexMap<&'a str, &'a Property>,
    /// Ancestor fqns that are not declared in the manifest.
    pub unresolved: Vec<String>,
    /// Ancestor fqns that close an inheritance cycle.
    pub cycles: Vec<String>,
}

impl TypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge assemblies in order. `origin` names the file for error messages.
    pub fn from_assemblies<I>(assemblies: I) -> Result<Self, ManifestError>
    where
        I: IntoIterator<Item = (String, Assembly)>,
    {
        let mut ts = TypeSystem::new();
        for (origin, assembly) in assemblies {
            ts.add_assembly(&origin, assembly)?;
        }
        Ok(ts)
    }

    pub fn add_assembly(&mut self, origin: &str, assembly: Assembly) -> Result<(), ManifestError> {
        for (fqn, def) in assembly.types {
            if let Some(first) = self.origins.get(&fqn) {
                return Err(ManifestError::DuplicateType {
                    fqn,
                    first: first.clone(),
                    second: origin.to_string(),
                });
            }
            self.origins.insert(fqn.clone(), origin.to_string());
            self.types.insert(fqn, def);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn find(&self, fqn: &str) -> Option<&TypeDef> {
        self.types.get(fqn)
    }

    pub fn find_class(&self, fqn: &str) -> Option<&ClassType> {
        match self.types.get(fqn)? {
            TypeDef::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassType> {
        self.types.values().filter_map(|t| match t {
            TypeDef::Class(c) => Some(c),
            _ => None,
        })
    }

    /// True if `base` appears in the class chain of `class`, itself included.
    pub fn class_extends(&self, class: &ClassType, base: &str) -> bool {
        let mut seen = HashSet::new();
        let mut cur = Some(class);
        while let Some(c) = cur {
            if c.fqn == base {
                return true;
            }
            if !seen.insert(c.fqn.as_str()) {
                return false;
            }
            cur = c.base.as_deref().and_then(|b| self.find_class(b));
        }
        false
    }

    /// Own properties first, then inherited ones, nearest ancestor first.
    /// A derived declaration wins over an inherited one of the same name, and
    /// among the extended types a later one wins over an earlier one.
    /// Static properties are left out.
    pub fn flatten_properties<'a>(&'a self, def: &'a TypeDef) -> Flattened<'a> {
        let mut out = Flattened::default();
        let mut stack = Vec::<&str>::new();
        let mut seen = HashSet::<&str>::new();
        let properties = self.flatten_into(def, &mut out, &mut stack, &mut seen);
        out.properties = properties;
        out
    }

    fn flatten_into<'a>(
        &'a self,
        def: &'a TypeDef,
        out: &mut Flattened<'a>,
        stack: &mut Vec<&'a str>,
        seen: &mut HashSet<&'a str>,
    ) -> IndexMap<&'a str, &'a Property> {
        let (props, parents): (&[Property], Vec<&str>) = match def {
            TypeDef::Class(c) => {
                let parents = c.base.iter().chain(&c.interfaces).map(String::as_str).collect();
                (&c.properties, parents)
            }
            TypeDef::Interface(i) => (&i.properties, i.interfaces.iter().map(String::as_str).collect()),
            TypeDef::Enum(_) => return IndexMap::new(),
        };
        stack.push(def.fqn());
        seen.insert(def.fqn());

        let mut inherited = IndexMap::<&str, &Property>::new();
        for parent in parents {
            if stack.contains(&parent) {
                out.cycles.push(parent.to_string());
                continue;
            }
            if seen.contains(parent) {
                // diamond: already flattened through another path
                continue;
            }
            match self.find(parent) {
                Some(parent_def) => inherited.extend(self.flatten_into(parent_def, out, stack, seen)),
                None => out.unresolved.push(parent.to_string()),
            }
        }
        stack.pop();

        let mut properties: IndexMap<&str, &Property> =
            props.iter().filter(|p| !p.is_static).map(|p| (p.name.as_str(), p)).collect();
        for (name, p) in inherited {
            properties.entry(name).or_insert(p);
        }
        properties
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assembly(v: Value) -> Assembly {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn type_refs_classify_every_manifest_shape() {
        assert_eq!(TypeRef::from_value(&json!({"primitive": "date"})), TypeRef::Primitive(Primitive::Date));
        assert_eq!(TypeRef::from_value(&json!({"fqn": "a.B"})), TypeRef::named("a.B"));
        assert_eq!(
            TypeRef::from_value(&json!({"collection": {"kind": "map", "elementtype": {"primitive": "number"}}})),
            TypeRef::map_of(TypeRef::Primitive(Primitive::Number)),
        );
        let union = TypeRef::from_value(&json!({"union": {"types": [{"primitive": "string"}, {"fqn": "a.B"}]}}));
        assert_eq!(union, TypeRef::Union(vec![TypeRef::Primitive(Primitive::String), TypeRef::named("a.B")]));
        let inter = json!({"intersection": {"types": [{"fqn": "a.B"}]}});
        assert!(matches!(TypeRef::from_value(&inter), TypeRef::Unsupported(_)));
        assert!(matches!(TypeRef::from_value(&json!({"primitive": "bigint"})), TypeRef::Unsupported(_)));
    }

    #[test]
    fn duplicate_fqn_across_assemblies_is_rejected() {
        let a = assembly(json!({"name": "a", "types": {"x.E": {"kind": "enum", "fqn": "x.E", "members": []}}}));
        let err = TypeSystem::from_assemblies([("a.json".to_string(), a.clone()), ("b.json".to_string(), a)]).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateType { .. }));
    }

    #[test]
    fn flatten_prefers_derived_and_skips_static() {
        let ts = TypeSystem::from_assemblies([("m".to_string(), assembly(json!({"types": {
            "x.Base": {"kind": "interface", "fqn": "x.Base", "properties": [
                {"name": "shared", "type": {"primitive": "number"}},
                {"name": "inherited", "type": {"primitive": "string"}}
            ]},
            "x.Props": {"kind": "interface", "fqn": "x.Props", "interfaces": ["x.Base"], "properties": [
                {"name": "own", "type": {"primitive": "boolean"}},
                {"name": "shared", "type": {"primitive": "string"}},
                {"name": "CONST", "type": {"primitive": "string"}, "static": true}
            ]}
        }})))]).unwrap();
        let def = ts.find("x.Props").unwrap();
        let flat = ts.flatten_properties(def);
        let names: Vec<_> = flat.properties.keys().copied().collect();
        assert_eq!(names, ["own", "shared", "inherited"]);
        assert_eq!(flat.properties["shared"].ty, TypeRef::Primitive(Primitive::String));
        assert!(flat.cycles.is_empty() && flat.unresolved.is_empty());
    }

    #[test]
    fn later_extended_interface_overrides_earlier_one() {
        let ts = TypeSystem::from_assemblies([("m".to_string(), assembly(json!({"types": {
            "x.A": {"kind": "interface", "fqn": "x.A", "properties": [
                {"name": "x", "type": {"primitive": "string"}},
                {"name": "a", "type": {"primitive": "string"}}
            ]},
            "x.Deep": {"kind": "interface", "fqn": "x.Deep", "properties": [
                {"name": "a", "type": {"primitive": "boolean"}}
            ]},
            "x.B": {"kind": "interface", "fqn": "x.B", "interfaces": ["x.Deep"], "properties": [
                {"name": "x", "type": {"primitive": "number"}}
            ]},
            "x.Props": {"kind": "interface", "fqn": "x.Props", "interfaces": ["x.A", "x.B"], "properties": [
                {"name": "own", "type": {"primitive": "string"}}
            ]}
        }})))]).unwrap();
        let flat = ts.flatten_properties(ts.find("x.Props").unwrap());
        let names: Vec<_> = flat.properties.keys().copied().collect();
        assert_eq!(names, ["own", "x", "a"]);
        assert_eq!(flat.properties["x"].ty, TypeRef::Primitive(Primitive::Number));
        assert_eq!(flat.properties["a"].ty, TypeRef::Primitive(Primitive::Boolean));
    }

    #[test]
    fn flatten_reports_cycles_and_missing_parents() {
        let ts = TypeSystem::from_assemblies([("m".to_string(), assembly(json!({"types": {
            "x.A": {"kind": "interface", "fqn": "x.A", "interfaces": ["x.B", "x.Gone"]},
            "x.B": {"kind": "interface", "fqn": "x.B", "interfaces": ["x.A"]}
        }})))]).unwrap();
        let flat = ts.flatten_properties(ts.find("x.A").unwrap());
        assert_eq!(flat.cycles, ["x.A"]);
        assert_eq!(flat.unresolved, ["x.Gone"]);
    }

    #[test]
    fn class_extends_includes_self_and_survives_cycles() {
        let ts = TypeSystem::from_assemblies([("m".to_string(), assembly(json!({"types": {
            "x.Root": {"kind": "class", "fqn": "x.Root"},
            "x.Mid": {"kind": "class", "fqn": "x.Mid", "base": "x.Root"},
            "x.Leaf": {"kind": "class", "fqn": "x.Leaf", "base": "x.Mid"},
            "x.Loop": {"kind": "class", "fqn": "x.Loop", "base": "x.Loop"}
        }})))]).unwrap();
        let leaf = ts.find_class("x.Leaf").unwrap();
        assert!(ts.class_extends(leaf, "x.Root"));
        assert!(ts.class_extends(leaf, "x.Leaf"));
        assert!(!ts.class_extends(ts.find_class("x.Loop").unwrap(), "x.Root"));
    }
}

//! Write-once map of named schema definitions.
//!
//! A key is reserved as `Pending` before its body is produced, so a type that
//! reaches itself again (directly or through others) gets a `$ref` back
//! instead of recursing. Once `Resolved`, a body never changes.
//!
//! Keys are the raw names (`@scope/pkg.Type` stays as is in `definitions`);
//! only the `$ref` pointer is escaped.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{EngineError, Result};

pub const DEFINITIONS_POINTER: &str = "#/definitions/";

/// Key prefix that keeps resource entries apart from the class schemas of
/// the same fqn.
pub const RESOURCE_KEY_PREFIX: &str = "resource:";

/// `$ref` segment for a definition key (RFC 6901 escaping).
pub fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// By-name reference to the definition registered under `key`.
pub fn reference(key: &str) -> Value {
    json!({ "$ref": format!("{DEFINITIONS_POINTER}{}", pointer_segment(key)) })
}

/// Definition key of the resource entry for a root class.
pub fn resource_key(fqn: &str) -> String {
    format!("{RESOURCE_KEY_PREFIX}{fqn}")
}

/// What registered a definition. A key belongs to one owner for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Type,
    Resource,
    Extension,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Type => f.write_str("type"),
            Owner::Resource => f.write_str("resource"),
            Owner::Extension => f.write_str("extension"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Pending,
    Resolved(Value),
}

#[derive(Debug, Clone)]
struct Slot {
    owner: Owner,
    entry: Entry,
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    entries: IndexMap<String, Slot>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `owner`. Returns false when the same owner already
    /// holds it (pending or resolved); a different owner is a clash.
    pub fn reserve(&mut self, key: &str, owner: Owner) -> Result<bool> {
        if let Some(slot) = self.entries.get(key) {
            if slot.owner != owner {
                return Err(EngineError::KeyClash {
                    key: key.to_string(),
                    held_by: slot.owner,
                    requested_by: owner,
                });
            }
            return Ok(false);
        }
        debug!(definition = %key, %owner, "reserved");
        self.entries.insert(key.to_string(), Slot { owner, entry: Entry::Pending });
        Ok(true)
    }

    /// Store the body of a reserved definition. Objects without a
    /// `description` are described by their key.
    pub fn resolve(&mut self, key: &str, mut fragment: Value) -> Result<()> {
        let Some(slot) = self.entries.get_mut(key) else {
            return Err(EngineError::NotReserved(key.to_string()));
        };
        if let Entry::Resolved(_) = slot.entry {
            return Err(EngineError::AlreadyResolved(key.to_string()));
        }
        if let Some(obj) = fragment.as_object_mut() {
            obj.entry("description").or_insert_with(|| Value::from(key));
        }
        slot.entry = Entry::Resolved(fragment);
        Ok(())
    }

    /// Register `key` once and hand back a reference to it. `produce` runs
    /// only for the first request; on failure the entry stays pending.
    pub fn define<E>(
        &mut self,
        key: &str,
        owner: Owner,
        produce: impl FnOnce(&mut Self) -> Result<Value, E>,
    ) -> Result<Value, E>
    where
        E: From<EngineError>,
    {
        if self.reserve(key, owner)? {
            let body = produce(self)?;
            self.resolve(key, body)?;
        }
        Ok(reference(key))
    }

    pub fn state(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    pub fn owner(&self, key: &str) -> Option<Owner> {
        self.entries.get(key).map(|slot| slot.owner)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.state(key)? {
            Entry::Resolved(v) => Some(v),
            Entry::Pending => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, slot)| matches!(slot.entry, Entry::Pending))
            .map(|(k, _)| k.as_str())
    }

    /// All bodies in first-visit order. A pending entry at this point means
    /// a producer failed without the run aborting.
    pub fn into_definitions(self) -> Result<IndexMap<String, Value>> {
        let mut out = IndexMap::with_capacity(self.entries.len());
        for (key, slot) in self.entries {
            match slot.entry {
                Entry::Resolved(v) => {
                    out.insert(key, v);
                }
                Entry::Pending => return Err(EngineError::UnresolvedDefinition(key)),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_runs_producer_once_and_returns_references() {
        let mut reg = DefinitionRegistry::new();
        let mut calls = 0;
        for _ in 0..3 {
            let r = reg.define::<EngineError>("x.Thing", Owner::Type, |_| {
                calls += 1;
                Ok(json!({ "type": "object" }))
            }).unwrap();
            assert_eq!(r, json!({ "$ref": "#/definitions/x.Thing" }));
        }
        assert_eq!(calls, 1);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("x.Thing").unwrap()["description"], "x.Thing");
    }

    #[test]
    fn recursive_request_sees_pending_entry() {
        let mut reg = DefinitionRegistry::new();
        let r = reg.define::<EngineError>("x.Node", Owner::Type, |reg| {
            assert_eq!(reg.state("x.Node"), Some(&Entry::Pending));
            let inner = reg.define::<EngineError>("x.Node", Owner::Type, |_| panic!("must not recurse"))?;
            Ok(json!({ "type": "object", "properties": { "next": inner } }))
        }).unwrap();
        assert_eq!(r["$ref"], "#/definitions/x.Node");
        let body = reg.get("x.Node").unwrap();
        assert_eq!(body["properties"]["next"]["$ref"], "#/definitions/x.Node");
    }

    #[test]
    fn failed_producer_leaves_entry_pending() {
        let mut reg = DefinitionRegistry::new();
        let err = reg.define("x.Bad", Owner::Type, |_| Err(EngineError::Envelope("boom".into())));
        assert!(err.is_err());
        assert_eq!(reg.state("x.Bad"), Some(&Entry::Pending));
        // not retried
        let again = reg.define::<EngineError>("x.Bad", Owner::Type, |_| panic!("must not retry")).unwrap();
        assert_eq!(again["$ref"], "#/definitions/x.Bad");
        assert_eq!(reg.pending().collect::<Vec<_>>(), ["x.Bad"]);
        assert!(matches!(reg.into_definitions(), Err(EngineError::UnresolvedDefinition(k)) if k == "x.Bad"));
    }

    #[test]
    fn keys_stay_raw_and_only_references_are_escaped() {
        let mut reg = DefinitionRegistry::new();
        reg.define::<EngineError>("@a/b.C", Owner::Type, |_| Ok(json!({ "type": "string" }))).unwrap();
        reg.define::<EngineError>("@a.b.C", Owner::Type, |_| Ok(json!({ "type": "number" }))).unwrap();
        reg.define::<EngineError>("a~b.D", Owner::Type, |_| Ok(json!({}))).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reference("@a/b.C")["$ref"], "#/definitions/@a~1b.C");
        assert_eq!(reference("a~b.D")["$ref"], "#/definitions/a~0b.D");

        let defs = reg.into_definitions().unwrap();
        assert_eq!(defs.keys().collect::<Vec<_>>(), ["@a/b.C", "@a.b.C", "a~b.D"]);
        assert_eq!(defs["@a/b.C"]["type"], "string");
        assert_eq!(defs["@a.b.C"]["type"], "number");

        let doc = json!({ "definitions": defs, "allOf": [reference("@a/b.C")] });
        let validator = jsonschema::JSONSchema::compile(&doc).unwrap();
        assert!(validator.is_valid(&json!("text")));
        assert!(!validator.is_valid(&json!(1)));
    }

    #[test]
    fn a_key_keeps_its_owner() {
        let mut reg = DefinitionRegistry::new();
        reg.define::<EngineError>("Tag", Owner::Extension, |_| Ok(json!({}))).unwrap();
        assert!(!reg.reserve("Tag", Owner::Extension).unwrap());
        let err = reg.define::<EngineError>("Tag", Owner::Type, |_| panic!("must not produce")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::KeyClash { held_by: Owner::Extension, requested_by: Owner::Type, .. }
        ));
        assert_eq!(reg.owner("Tag"), Some(Owner::Extension));
    }

    #[test]
    fn resolve_guards_its_invariants() {
        let mut reg = DefinitionRegistry::new();
        assert!(matches!(reg.resolve("x.A", json!({})), Err(EngineError::NotReserved(_))));
        assert!(reg.reserve("x.A", Owner::Type).unwrap());
        assert!(!reg.reserve("x.A", Owner::Type).unwrap());
        reg.resolve("x.A", json!({})).unwrap();
        assert!(matches!(reg.resolve("x.A", json!({})), Err(EngineError::AlreadyResolved(_))));
    }
}

//! Type reference → schema fragment.
//!
//! Named classes and interfaces always go through the definition registry
//! and come back as `$ref`s, so every distinct type is compiled once and
//! recursive type graphs terminate. Per-type problems are recorded on the
//! diagnostics tree; only invariant violations bubble up as errors.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::diagnostics::{Diagnostics, NodeId};
use crate::error::{EngineError, Result};
use crate::manifest::{CollectionKind, EnumType, Primitive, TypeDef, TypeRef, TypeSystem};
use crate::registry::{reference, DefinitionRegistry, Owner};

pub const MARKER_INTERFACE_WARNING: &str = "interface has no data properties; any object may satisfy it";

#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Definition offered next to every object property as
    /// `anyOf[literal, {"$ref": alternative}]`.
    pub symbolic_alternative: Option<String>,
}

pub struct Compiler<'m> {
    types: &'m TypeSystem,
    registry: DefinitionRegistry,
    diagnostics: Diagnostics,
    options: CompilerOptions,
}

impl<'m> Compiler<'m> {
    pub fn new(types: &'m TypeSystem, options: CompilerOptions) -> Self {
        Self::with_registry(types, DefinitionRegistry::new(), options)
    }

    /// Start from a registry already populated by extensions.
    pub fn with_registry(types: &'m TypeSystem, registry: DefinitionRegistry, options: CompilerOptions) -> Self {
        Self { types, registry, diagnostics: Diagnostics::new(), options }
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn into_parts(self) -> (DefinitionRegistry, Diagnostics) {
        (self.registry, self.diagnostics)
    }

    /// Registry-backed definition whose producer may compile further types.
    pub fn define(
        &mut self,
        key: &str,
        owner: Owner,
        produce: impl FnOnce(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        if self.registry.reserve(key, owner)? {
            let body = produce(self)?;
            self.registry.resolve(key, body)?;
            debug!(definition = %key, "resolved");
        }
        Ok(reference(key))
    }

    pub fn compile(&mut self, ty: &TypeRef, ctx: NodeId) -> Result<Value> {
        match ty {
            TypeRef::Primitive(p) => Ok(primitive_schema(*p)),
            TypeRef::Named(fqn) => self.compile_named(fqn, ctx),
            TypeRef::Union(members) => {
                let arms = members
                    .iter()
                    .map(|m| self.compile(m, ctx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!({ "anyOf": arms }))
            }
            TypeRef::Collection { kind: CollectionKind::Array, element } => {
                Ok(json!({ "type": "array", "items": self.compile(element, ctx)? }))
            }
            TypeRef::Collection { kind: CollectionKind::Map, element } => {
                Ok(json!({ "type": "object", "additionalProperties": self.compile(element, ctx)? }))
            }
            TypeRef::Unsupported(raw) => {
                self.diagnostics.error(ctx, format!("unsupported type reference {raw}"));
                Ok(json!({}))
            }
        }
    }

    fn compile_named(&mut self, fqn: &str, ctx: NodeId) -> Result<Value> {
        let types = self.types;
        let Some(def) = types.find(fqn) else {
            self.diagnostics.error(ctx, format!("unresolvable type reference {fqn}"));
            return Ok(json!({}));
        };
        match def {
            TypeDef::Enum(e) => Ok(enum_schema(e)),
            TypeDef::Class(_) | TypeDef::Interface(_) => {
                if let Some(owner) = self.registry.owner(fqn).filter(|o| *o != Owner::Type) {
                    let message = format!("type {fqn} clashes with the {owner} definition of the same key");
                    self.diagnostics.error(ctx, message);
                    return Ok(json!({}));
                }
                let scope = self.diagnostics.child(ctx, def.kind(), fqn);
                self.define(fqn, Owner::Type, |this| this.object_schema(def, scope))
            }
        }
    }

    fn object_schema(&mut self, def: &'m TypeDef, scope: NodeId) -> Result<Value> {
        let types = self.types;
        let flat = types.flatten_properties(def);
        for fqn in &flat.cycles {
            self.diagnostics.error(scope, format!("inheritance cycle through {fqn}"));
        }
        for fqn in &flat.unresolved {
            self.diagnostics.error(scope, format!("unresolvable base type {fqn}"));
        }

        if flat.properties.is_empty() && matches!(def, TypeDef::Interface(_)) {
            self.diagnostics.warn(scope, MARKER_INTERFACE_WARNING);
            return Ok(json!({ "type": "object" }));
        }

        let mut properties = Map::new();
        let mut required = Vec::<Value>::new();
        for (name, prop) in flat.properties {
            let mut schema = self.compile(&prop.ty, scope)?;
            if let Some(alt) = self.options.symbolic_alternative.as_deref() {
                if !self.registry.contains(alt) {
                    return Err(EngineError::MissingAlternative(alt.to_string()));
                }
                schema = json!({ "anyOf": [schema, reference(alt)] });
            }
            if let (Some(summary), Some(obj)) = (prop.docs.summary.as_deref(), schema.as_object_mut()) {
                obj.entry("description").or_insert_with(|| Value::from(summary));
            }
            properties.insert(name.to_string(), schema);
            if !prop.optional {
                required.push(Value::from(name));
            }
        }

        let mut o = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": properties,
        });
        if !required.is_empty() {
            o["required"] = Value::Array(required);
        }
        if let Some(summary) = &def.docs().summary {
            o["description"] = Value::from(summary.as_str());
        }
        Ok(o)
    }
}

fn primitive_schema(p: Primitive) -> Value {
    match p {
        Primitive::String => json!({ "type": "string" }),
        Primitive::Number => json!({ "type": "number" }),
        Primitive::Boolean => json!({ "type": "boolean" }),
        Primitive::Date => json!({ "type": "string", "format": "date-time" }),
        Primitive::Json => json!({ "type": "object" }),
        Primitive::Any => json!({}),
    }
}

fn enum_schema(e: &EnumType) -> Value {
    let mut schema = json!({
        "type": "string",
        "enum": e.members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
    });
    if let Some(summary) = &e.docs.summary {
        schema["description"] = Value::from(summary.as_str());
    }
    schema
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

//! Extension hooks: independent named definitions registered next to the
//! compiled types.
//!
//! A hook only registers definitions. Whether a property offers one of them
//! as an alternative is decided by [`crate::compiler::CompilerOptions`].

use serde_json::{json, Value};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::registry::{reference, DefinitionRegistry, Owner};

pub trait SchemaExtension {
    fn name(&self) -> &str;
    fn extend(&self, registry: &mut DefinitionRegistry) -> Result<()>;
}

/// Run each hook once, in order.
pub fn apply_extensions(extensions: &[Box<dyn SchemaExtension>], registry: &mut DefinitionRegistry) -> Result<()> {
    for ext in extensions {
        let before = registry.len();
        ext.extend(registry)?;
        info!(extension = ext.name(), definitions = registry.len() - before, "extension applied");
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// INTRINSIC FUNCTIONS
// ————————————————————————————————————————————————————————————————————————————

/// Definition that accepts any registered intrinsic function call.
pub const EXPRESSION_DEFINITION: &str = "Expression";

/// Symbolic references to other values of the document, e.g.
/// `{"Ref": "OtherResource"}`.
#[derive(Debug, Clone)]
pub struct IntrinsicFunctions {
    functions: Vec<String>,
}

impl Default for IntrinsicFunctions {
    fn default() -> Self {
        Self::new(["Ref", "Fn::Ref"])
    }
}

impl IntrinsicFunctions {
    pub fn new<I>(functions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self { functions: functions.into_iter().map(Into::into).collect() }
    }
}

impl SchemaExtension for IntrinsicFunctions {
    fn name(&self) -> &str {
        "intrinsic-functions"
    }

    fn extend(&self, registry: &mut DefinitionRegistry) -> Result<()> {
        let mut arms = Vec::with_capacity(self.functions.len());
        for function in &self.functions {
            let r = registry.define::<EngineError>(function, Owner::Extension, |_| {
                Ok(intrinsic_call(function))
            })?;
            arms.push(r);
        }
        registry.define::<EngineError>(EXPRESSION_DEFINITION, Owner::Extension, |_| {
            Ok(json!({ "anyOf": arms }))
        })?;
        Ok(())
    }
}

fn intrinsic_call(function: &str) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": { function: { "type": "string" } },
        "required": [function],
    })
}

// ————————————————————————————————————————————————————————————————————————————
// RESOURCE CONVENTIONS
// ————————————————————————————————————————————————————————————————————————————

pub const CALL_DEFINITION: &str = "Call";
pub const TAG_DEFINITION: &str = "Tag";
pub const DEPENDS_ON_DEFINITION: &str = "DependsOn";
pub const OVERRIDE_DEFINITION: &str = "Override";

/// Shared definitions every resource entry points at.
#[derive(Debug, Clone, Default)]
pub struct ResourceConventions;

impl SchemaExtension for ResourceConventions {
    fn name(&self) -> &str {
        "resource-conventions"
    }

    fn extend(&self, registry: &mut DefinitionRegistry) -> Result<()> {
        let shared = [
            (CALL_DEFINITION, call_definition()),
            (TAG_DEFINITION, tag_definition()),
            (DEPENDS_ON_DEFINITION, depends_on_definition()),
            (OVERRIDE_DEFINITION, override_definition()),
        ];
        for (key, body) in shared {
            registry.define::<EngineError>(key, Owner::Extension, |_| Ok(body))?;
        }
        Ok(())
    }
}

/// References used by the resource envelope, in property order.
pub fn resource_convention_refs() -> [Value; 4] {
    [
        reference(CALL_DEFINITION),
        reference(TAG_DEFINITION),
        reference(DEPENDS_ON_DEFINITION),
        reference(OVERRIDE_DEFINITION),
    ]
}

fn call_definition() -> Value {
    json!({
        "anyOf": [
            { "type": "object" },
            { "type": "array", "minItems": 1, "maxItems": 2 },
        ]
    })
}

fn tag_definition() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "Key": { "type": "string" },
            "Value": { "type": "string" },
        },
        "required": ["Key", "Value"],
    })
}

fn depends_on_definition() -> Value {
    json!({
        "additionalProperties": false,
        "type": ["array", "string"],
        "items": { "type": "string" },
    })
}

fn override_definition() -> Value {
    let path = json!({ "type": "string", "pattern": "[a-zA-Z0-9\\-\\._]+" });
    json!({
        "additionalProperties": false,
        "type": "object",
        "properties": {
            "ChildConstructPath": path,
            "RemoveResource": { "type": "boolean" },
            "Delete": {
                "type": "object",
                "properties": { "Path": path },
                "required": ["Path"],
            },
            "Update": {
                "type": "object",
                "properties": { "Path": path, "Value": {} },
                "required": ["Path"],
            },
        },
        "required": ["ChildConstructPath"],
        "oneOf": [
            { "required": ["Delete"] },
            { "required": ["Update"] },
            { "required": ["RemoveResource"] },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator_for(registry: DefinitionRegistry, key: &str) -> jsonschema::JSONSchema {
        let defs = registry.into_definitions().unwrap();
        let doc = json!({ "definitions": defs, "allOf": [reference(key)] });
        jsonschema::JSONSchema::compile(&doc).unwrap()
    }

    #[test]
    fn intrinsics_register_each_function_and_an_expression() {
        let mut registry = DefinitionRegistry::new();
        let exts: Vec<Box<dyn SchemaExtension>> = vec![Box::new(IntrinsicFunctions::default())];
        apply_extensions(&exts, &mut registry).unwrap();
        assert!(registry.contains("Ref") && registry.contains("Fn::Ref"));
        assert_eq!(
            registry.get(EXPRESSION_DEFINITION).unwrap()["anyOf"],
            json!([{ "$ref": "#/definitions/Ref" }, { "$ref": "#/definitions/Fn::Ref" }])
        );

        let v = validator_for(registry, EXPRESSION_DEFINITION);
        assert!(v.is_valid(&json!({ "Ref": "MyBucket" })));
        assert!(v.is_valid(&json!({ "Fn::Ref": "MyBucket" })));
        assert!(!v.is_valid(&json!({ "Ref": 1 })));
        assert!(!v.is_valid(&json!("MyBucket")));
    }

    #[test]
    fn hooks_compose_without_duplicating() {
        let mut registry = DefinitionRegistry::new();
        let exts: Vec<Box<dyn SchemaExtension>> = vec![
            Box::new(IntrinsicFunctions::new(["Ref"])),
            Box::new(IntrinsicFunctions::new(["Ref"])),
            Box::new(ResourceConventions),
        ];
        apply_extensions(&exts, &mut registry).unwrap();
        assert_eq!(registry.len(), 2 + 4);
    }

    #[test]
    fn overrides_require_exactly_one_action() {
        let mut registry = DefinitionRegistry::new();
        ResourceConventions.extend(&mut registry).unwrap();
        let v = validator_for(registry, OVERRIDE_DEFINITION);
        assert!(v.is_valid(&json!({ "ChildConstructPath": "Default", "Delete": { "Path": "a.b" } })));
        assert!(!v.is_valid(&json!({ "ChildConstructPath": "Default" })));
        assert!(!v.is_valid(&json!({ "ChildConstructPath": "Default", "RemoveResource": true, "Delete": { "Path": "a" } })));
    }
}

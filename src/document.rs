//! Document assembly: pick roots, compile them, splice everything into the
//! outer envelope.
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::compiler::{Compiler, CompilerOptions};
use crate::diagnostics::Diagnostics;
use crate::error::{EngineError, Result};
use crate::extensions::{
    apply_extensions, resource_convention_refs, IntrinsicFunctions, ResourceConventions, SchemaExtension,
    EXPRESSION_DEFINITION,
};
use crate::manifest::TypeSystem;
use crate::registry::{resource_key, DefinitionRegistry, Owner};
use crate::roots::{select_roots, ClassAndProps, RootSelection};

pub const DEFAULT_RESOURCE_PATTERN: &str = "^[a-zA-Z0-9]+$";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub selection: RootSelection,
    /// Key under `Resources.patternProperties` whose `anyOf` lists resources.
    pub resource_pattern: String,
    /// Offer `Expression` next to every property.
    pub symbolic_alternatives: bool,
}

#[derive(Debug)]
pub struct Rendered {
    pub document: Value,
    /// Fqns of the roots added to the resource list, in order.
    pub resources: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Skeleton used when no envelope file is given.
pub fn default_envelope(resource_pattern: &str) -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "Resources": {
                "type": "object",
                "patternProperties": {
                    resource_pattern: { "anyOf": [] }
                },
                "additionalProperties": false
            }
        },
        "definitions": {}
    })
}

pub fn default_extensions() -> Vec<Box<dyn SchemaExtension>> {
    vec![Box::new(IntrinsicFunctions::default()), Box::new(ResourceConventions)]
}

pub fn render_full_schema(types: &TypeSystem, envelope: Value, options: &RenderOptions) -> Result<Rendered> {
    render_with_extensions(types, envelope, options, &default_extensions())
}

pub fn render_with_extensions(
    types: &TypeSystem,
    mut envelope: Value,
    options: &RenderOptions,
    extensions: &[Box<dyn SchemaExtension>],
) -> Result<Rendered> {
    let mut registry = DefinitionRegistry::new();
    apply_extensions(extensions, &mut registry)?;

    let compiler_options = CompilerOptions {
        symbolic_alternative: options.symbolic_alternatives.then(|| EXPRESSION_DEFINITION.to_string()),
    };
    let mut compiler = Compiler::with_registry(types, registry, compiler_options);

    let roots = select_roots(types, &options.selection, compiler.diagnostics_mut())?;
    let mut resource_refs = Vec::with_capacity(roots.len());
    let mut resources = Vec::with_capacity(roots.len());
    for root in &roots {
        info!(fqn = %root.class.fqn, "adding resource");
        resource_refs.push(schema_for_resource(&mut compiler, root)?);
        resources.push(root.class.fqn.clone());
    }

    let (registry, diagnostics) = compiler.into_parts();
    let definitions = registry.into_definitions()?;
    splice(&mut envelope, definitions, resource_refs, &options.resource_pattern)?;

    Ok(Rendered { document: envelope, resources, diagnostics })
}

/// Resource entry for one root, registered under its [`resource_key`] so a
/// class that is also used as a property type keeps its own object schema.
pub fn schema_for_resource(compiler: &mut Compiler<'_>, root: &ClassAndProps<'_>) -> Result<Value> {
    let fqn = root.class.fqn.as_str();
    let top = compiler.diagnostics().root();
    let scope = compiler.diagnostics_mut().child(top, "resource", fqn);
    let props_ty = root.props;
    compiler.define(&resource_key(fqn), Owner::Resource, |c| {
        let props = c.compile(props_ty, scope)?;
        let [call, tag, depends_on, override_] = resource_convention_refs();
        Ok(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "Type": { "type": "string", "enum": [fqn] },
                "Properties": props,
                "Call": call,
                "Tags": { "type": "array", "items": tag },
                "DependsOn": depends_on,
                "Overrides": { "type": "array", "items": override_ },
            },
            "required": ["Type"],
            "description": fqn,
        }))
    })
}

fn splice(
    envelope: &mut Value,
    definitions: IndexMap<String, Value>,
    resource_refs: Vec<Value>,
    resource_pattern: &str,
) -> Result<()> {
    let root = envelope
        .as_object_mut()
        .ok_or_else(|| EngineError::Envelope("document root is not an object".into()))?;

    let defs = object_entry(root, "definitions")?;
    for (key, body) in definitions {
        defs.insert(key, body);
    }

    let properties = object_entry(root, "properties")?;
    properties.insert("$schema".into(), json!({ "type": "string" }));

    let resources = object_entry(properties, "Resources")?;
    let patterns = object_entry(resources, "patternProperties")?;
    let pattern = object_entry(patterns, resource_pattern)?;
    let any_of = pattern
        .entry("anyOf")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| EngineError::Envelope(format!("{resource_pattern}.anyOf is not an array")))?;
    any_of.extend(resource_refs);
    Ok(())
}

/// `map[key]` as an object, created when missing.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Map<String, Value>> {
    map.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| EngineError::Envelope(format!("{key} is not an object")))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

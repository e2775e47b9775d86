//! Root selection: which classes get their own resource entry.
use serde::Serialize;
use tracing::info;

use crate::diagnostics::Diagnostics;
use crate::error::ManifestError;
use crate::manifest::{ClassType, TypeRef, TypeSystem};

#[derive(Debug, Clone)]
pub struct RootSelection {
    /// Classes must have this class in their hierarchy.
    pub base_class: String,
    /// Initializer position of the properties parameter.
    pub props_param_index: usize,
    /// Classes whose fqn starts with one of these are left out.
    pub skip_prefixes: Vec<String>,
}

/// A selected root and its properties type.
#[derive(Debug, Clone, Copy)]
pub struct ClassAndProps<'m> {
    pub class: &'m ClassType,
    pub props: &'m TypeRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootSummary {
    pub fqn: String,
    #[serde(rename = "propsType")]
    pub props_type: Option<String>,
}

impl ClassAndProps<'_> {
    pub fn summary(&self) -> RootSummary {
        RootSummary {
            fqn: self.class.fqn.clone(),
            props_type: self.props.fqn().map(str::to_string),
        }
    }
}

/// Type of the initializer parameter at `index`, when it is a named type.
pub fn props_param(class: &ClassType, index: usize) -> Option<&TypeRef> {
    class
        .parameter(index)
        .map(|p| &p.ty)
        .filter(|ty| matches!(ty, TypeRef::Named(_)))
}

/// Roots in manifest order. Classes of the right lineage without a props
/// parameter are noted on a `skipped` diagnostic scope.
pub fn select_roots<'m>(
    types: &'m TypeSystem,
    selection: &RootSelection,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ClassAndProps<'m>>, ManifestError> {
    if types.find_class(&selection.base_class).is_none() {
        return Err(ManifestError::UnknownBaseClass(selection.base_class.clone()));
    }

    let mut out = Vec::new();
    for class in types.classes() {
        if !types.class_extends(class, &selection.base_class) {
            continue;
        }
        let Some(props) = props_param(class, selection.props_param_index) else {
            info!(fqn = %class.fqn, "skipping (no props parameter)");
            let root = diagnostics.root();
            let node = diagnostics.child(root, "skipped", &class.fqn);
            diagnostics.warn(
                node,
                format!(
                    "no properties parameter at initializer position {}; not constructible from a document",
                    selection.props_param_index
                ),
            );
            continue;
        };
        if selection.skip_prefixes.iter().any(|p| class.fqn.starts_with(p.as_str())) {
            info!(fqn = %class.fqn, "skipping resource");
            continue;
        }
        out.push(ClassAndProps { class, props });
    }
    info!(count = out.len(), "found resources");
    Ok(out)
}

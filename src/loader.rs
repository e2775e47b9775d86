//! Manifest provider: resolve input patterns, read, pre-filter and decode
//! every assembly into one [`TypeSystem`].
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ManifestError;
use crate::manifest::{Assembly, TypeSystem};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Literal paths or glob patterns.
    pub inputs: Vec<String>,
    /// jq filter applied to each file; every output is one assembly.
    pub jq_expr: Option<String>,
}

pub fn load_type_system(options: &LoadOptions) -> Result<TypeSystem, ManifestError> {
    let paths = resolve_file_path_patterns(&options.inputs)?;
    let mut ts = TypeSystem::new();
    for path in &paths {
        for (origin, assembly) in load_assemblies(path, options.jq_expr.as_deref())? {
            debug!(%origin, name = %assembly.name, types = assembly.types.len(), "loaded assembly");
            ts.add_assembly(&origin, assembly)?;
        }
    }
    info!(files = paths.len(), types = ts.len(), "type system loaded");
    Ok(ts)
}

fn load_assemblies(path: &Path, jq_expr: Option<&str>) -> Result<Vec<(String, Assembly)>, ManifestError> {
    let origin = path.to_string_lossy().to_string();
    let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: origin.clone(),
        source,
    })?;
    let Some(jq_expr) = jq_expr else {
        let assembly = crate::path_de::from_str_with_path::<Assembly>(&source, &origin)?;
        return Ok(vec![(origin, assembly)]);
    };

    let json_value = crate::path_de::from_str_with_path::<serde_json::Value>(&source, &origin)?;
    let outputs = crate::jq_exec::run_jaq(jq_expr, &json_value).map_err(|error| ManifestError::Jq {
        origin: origin.clone(),
        message: error.to_string(),
    })?;
    outputs
        .into_iter()
        .enumerate()
        .map(|(ix, doc)| {
            let doc_origin = format!("{origin}#{ix}");
            let assembly = crate::path_de::from_value_with_path::<Assembly>(doc, &doc_origin)?;
            Ok::<_, ManifestError>((doc_origin, assembly))
        })
        .collect()
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, ManifestError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let entries = glob::glob(pattern).map_err(|e| ManifestError::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            let mut matched = Vec::new();
            for entry in entries {
                let p = entry.map_err(|e| ManifestError::Pattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
                matched.push(p);
            }
            if matched.is_empty() {
                return Err(ManifestError::NoMatches(pattern.to_string()));
            }
            out.extend(matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), serde_json::to_string(&value).unwrap()).unwrap();
    }

    #[test]
    fn glob_inputs_merge_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", json!({"name": "a", "types": {"a.E": {"kind": "enum", "fqn": "a.E"}}}));
        write(dir.path(), "b.json", json!({"name": "b", "types": {"b.E": {"kind": "enum", "fqn": "b.E"}}}));
        let pattern = dir.path().join("*.json").to_string_lossy().to_string();
        let ts = load_type_system(&LoadOptions { inputs: vec![pattern], jq_expr: None }).unwrap();
        assert_eq!(ts.len(), 2);
        assert!(ts.find("a.E").is_some() && ts.find("b.E").is_some());
    }

    #[test]
    fn empty_glob_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.json").to_string_lossy().to_string();
        let err = load_type_system(&LoadOptions { inputs: vec![pattern], jq_expr: None }).unwrap_err();
        assert!(matches!(err, ManifestError::NoMatches(_)));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_type_system(&LoadOptions { inputs: vec!["/nonexistent/m.json".into()], jq_expr: None }).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn jq_expr_selects_bundled_assemblies() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bundle.json", json!({"bundled": [
            {"name": "a", "types": {"a.E": {"kind": "enum", "fqn": "a.E"}}},
            {"name": "b", "types": {"b.E": {"kind": "enum", "fqn": "b.E"}}}
        ]}));
        let input = dir.path().join("bundle.json").to_string_lossy().to_string();
        let ts = load_type_system(&LoadOptions { inputs: vec![input], jq_expr: Some(".bundled[]".into()) }).unwrap();
        assert_eq!(ts.len(), 2);
    }
}

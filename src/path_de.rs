use serde::de::DeserializeOwned;

use crate::error::ManifestError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str, origin: &str) -> Result<T, ManifestError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| decode_error(err, origin))
}

/// Same as [`from_str_with_path`] for an already parsed document (jq output).
pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value, origin: &str) -> Result<T, ManifestError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| decode_error(err, origin))
}

fn decode_error(err: serde_path_to_error::Error<serde_json::Error>, origin: &str) -> ManifestError {
    ManifestError::Decode {
        origin: origin.to_string(),
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Assembly;

    #[test]
    fn decode_errors_name_the_offending_path() {
        let src = r#"{"types": {"x.A": {"kind": "class", "fqn": 42}}}"#;
        let err = from_str_with_path::<Assembly>(src, "bad.json").unwrap_err();
        match err {
            ManifestError::Decode { origin, path, .. } => {
                assert_eq!(origin, "bad.json");
                assert!(path.starts_with("types.x.A"), "unexpected path {path}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}

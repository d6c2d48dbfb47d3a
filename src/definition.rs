//! Loading of declarative YAML documents (pipelines, eval suites).

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::DefinitionError;

/// Reads and deserialises a YAML document.
///
/// # Errors
///
/// Returns [`DefinitionError::Read`] if the file cannot be read and
/// [`DefinitionError::Parse`] if it does not match `T`.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, DefinitionError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| DefinitionError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Doc {
        name: String,
    }

    #[test]
    fn test_load_yaml_errors_are_distinct() {
        let dir = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));

        let missing = load_yaml::<Doc>(&dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(DefinitionError::Read { .. })));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "name: [unclosed").unwrap_or_else(|e| panic!("write failed: {e}"));
        assert!(matches!(load_yaml::<Doc>(&bad), Err(DefinitionError::Parse { .. })));

        let good = dir.path().join("good.yaml");
        std::fs::write(&good, "name: demo\n").unwrap_or_else(|e| panic!("write failed: {e}"));
        let doc = load_yaml::<Doc>(&good).unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(doc.name, "demo");
    }
}

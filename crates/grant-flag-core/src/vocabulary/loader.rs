use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::debug;

use super::Vocabulary;

/// Load a vocabulary file; `.json`/`.json5` are read as JSON5, anything else as YAML.
pub fn load_vocabulary(path: &Path) -> Result<Vocabulary> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read vocabulary file at {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let vocabulary = match extension.as_str() {
        "json" | "json5" => Vocabulary::from_json5_str(&raw),
        _ => Vocabulary::from_yaml_str(&raw),
    }
    .with_context(|| format!("invalid vocabulary in {}", path.display()))?;
    debug!(path = %path.display(), tiers = vocabulary.len(), "vocabulary loaded");
    Ok(vocabulary)
}

/// Load the file at `path` when given, otherwise the built-in table.
pub fn load_or_builtin(path: Option<&Path>) -> Result<Vocabulary> {
    match path {
        Some(path) => load_vocabulary(path),
        None => Ok(Vocabulary::builtin()
            .context("built-in vocabulary is invalid")?
            .clone()),
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use skyprobe::Template;

/// Load a template from a `.json` file, or TOML for any other extension
pub fn load_template(path: &Path) -> Result<Template> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read template {}", path.display()))?;

    let template = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&raw).with_context(|| format!("invalid template {}", path.display()))?,
        _ => toml::from_str(&raw).with_context(|| format!("invalid template {}", path.display()))?,
    };
    Ok(template)
}

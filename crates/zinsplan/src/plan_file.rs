//! Plan files on disk
//!
//! A plan is a [`PlanInput`] in YAML (`.yaml`, `.yml`) or JSON (`.json`).
//! Fields left out are filled from the defaults during normalization.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use zinsplan_core::PlanInput;

/// Error types for plan file operations
#[derive(Debug)]
pub enum PlanFileError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for PlanFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanFileError::Io(msg) => write!(f, "IO error: {msg}"),
            PlanFileError::Parse(msg) => write!(f, "Parse error: {msg}"),
            PlanFileError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for PlanFileError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Format {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Parse a plan from `content` in the format implied by `path`
pub fn parse_plan(path: &Path, content: &str) -> Result<PlanInput, PlanFileError> {
    match Format::of(path) {
        Format::Yaml => serde_saphyr::from_str(content)
            .map_err(|e| PlanFileError::Parse(format!("{}: {e}", path.display()))),
        Format::Json => serde_json::from_str(content)
            .map_err(|e| PlanFileError::Parse(format!("{}: {e}", path.display()))),
    }
}

pub fn load_plan(path: &Path) -> Result<PlanInput, PlanFileError> {
    let content = fs::read_to_string(path)
        .map_err(|e| PlanFileError::Io(format!("Failed to read {}: {e}", path.display())))?;
    let plan = parse_plan(path, &content)?;
    tracing::debug!(path = %path.display(), "Loaded plan file");
    Ok(plan)
}

/// Write content to a file atomically using write-then-rename.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Write a plan (partial or normalized) in the format implied by `path`
pub fn save_plan<T: Serialize>(path: &Path, plan: &T) -> Result<(), PlanFileError> {
    let content = match Format::of(path) {
        Format::Yaml => {
            serde_saphyr::to_string(plan).map_err(|e| PlanFileError::Serialize(e.to_string()))?
        }
        Format::Json => serde_json::to_string_pretty(plan)
            .map_err(|e| PlanFileError::Serialize(e.to_string()))?,
    };
    atomic_write(path, &content)
        .map_err(|e| PlanFileError::Io(format!("Failed to write {}: {e}", path.display())))
}

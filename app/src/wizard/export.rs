// Export hand-off: the service already produced the CSV/JSON text, this only names and saves it.

use crate::error::Result;
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub format: ExportFormat,
    pub contents: String,
}

impl ExportArtifact {
    pub fn new(original_name: &str, format: ExportFormat, contents: String) -> Self {
        Self {
            file_name: format!(
                "{}_cleaned.{}",
                strip_extension(original_name),
                format.extension()
            ),
            format,
            contents,
        }
    }

    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    /// Write into `dir` via a temp file persisted under the final name, so a partial write never
    /// leaves a truncated export behind.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let target = dir.join(&self.file_name);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.contents.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        info!(
            "[PHASE: export] [STEP: save] Saved {} ({}, {} bytes) to {:?}",
            self.file_name,
            self.mime(),
            self.contents.len(),
            target
        );
        Ok(target)
    }
}

/// Drop the last `.ext` (at least one character, no path separator).
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i + 1 < name.len() && !name[i + 1..].contains(['/', '.']) => &name[..i],
        _ => name,
    }
}

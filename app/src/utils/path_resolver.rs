use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Resolve log folder (absolute path), creating it if needed.
pub fn resolve_log_folder(settings: &Settings) -> Result<PathBuf> {
    let dir = match &settings.log_dir {
        Some(dir) => dir.clone(),
        None => default_log_folder(),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", dir, e))?;
    Ok(dir)
}

fn default_log_folder() -> PathBuf {
    // Prefer the per-user data dir; fall back to the working directory on systems without one.
    if let Some(base) = dirs::data_local_dir() {
        return base.join("sheet-cleaner").join("logs");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("sheet-cleaner-logs")
}

/// Resolve the export folder, creating it if needed.
pub fn resolve_output_folder(settings: &Settings) -> Result<PathBuf> {
    let dir = settings.output_dir.clone();
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create output folder {:?}: {}", dir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_log_dir_is_created() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let settings = Settings {
            log_dir: Some(tmp.path().join("nested").join("logs")),
            ..Settings::default()
        };
        let dir = resolve_log_folder(&settings).expect("log folder");
        assert!(dir.is_dir());
        assert!(dir.ends_with("nested/logs"));
    }

    #[test]
    fn output_dir_is_created() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let settings = Settings {
            output_dir: tmp.path().join("exports"),
            ..Settings::default()
        };
        let dir = resolve_output_folder(&settings).expect("output folder");
        assert!(dir.is_dir());
    }
}

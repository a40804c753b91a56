// Runtime settings
// Layered: built-in defaults -> TOML file -> SHEET_CLEANER_* environment variables.

use crate::error::{Result, WizardError};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

pub const ENV_PREFIX: &str = "SHEET_CLEANER";
pub const LOCAL_CONFIG_FILE: &str = "sheet-cleaner.toml";
const ENDPOINT_PATH: &str = "api/convert";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the conversion service; requests go to `{server_url}/api/convert`.
    pub server_url: String,
    /// Unset means the HTTP client's own default (no overall timeout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Where exports are saved.
    pub output_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: None,
            output_dir: PathBuf::from("."),
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings. An explicit path must exist; the default locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("server_url", defaults.server_url.clone())?
            .set_default(
                "output_dir",
                defaults.output_dir.to_string_lossy().to_string(),
            )?;

        match explicit {
            Some(path) => {
                builder = builder.add_source(
                    File::from(path.to_path_buf())
                        .format(FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                for candidate in default_config_files() {
                    builder = builder
                        .add_source(File::from(candidate).format(FileFormat::Toml).required(false));
                }
            }
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.endpoint()?;
        Ok(settings)
    }

    /// Fully-qualified conversion endpoint.
    pub fn endpoint(&self) -> Result<Url> {
        let mut base = self.server_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| {
            WizardError::Config(format!("Invalid server_url '{}': {}", self.server_url, e))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(WizardError::Config(format!(
                "server_url must use http or https, got '{}'",
                base.scheme()
            )));
        }
        base.join(ENDPOINT_PATH)
            .map_err(|e| WizardError::Config(format!("Invalid server_url: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WizardError::Config(e.to_string()))
    }
}

/// Lowest priority first.
fn default_config_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("sheet-cleaner").join("config.toml"));
    }
    files.push(PathBuf::from(LOCAL_CONFIG_FILE));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn endpoint_appends_api_path() {
        let s = Settings {
            server_url: "https://convert.example.com".to_string(),
            ..Settings::default()
        };
        assert_eq!(
            s.endpoint().expect("valid").as_str(),
            "https://convert.example.com/api/convert"
        );
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let s = Settings {
            server_url: "http://localhost:8000/tools".to_string(),
            ..Settings::default()
        };
        assert_eq!(
            s.endpoint().expect("valid").as_str(),
            "http://localhost:8000/tools/api/convert"
        );
    }

    #[test]
    fn endpoint_rejects_non_http_scheme() {
        let s = Settings {
            server_url: "ftp://files.example.com".to_string(),
            ..Settings::default()
        };
        let err = s.endpoint().expect_err("ftp is not allowed");
        assert!(err.to_string().contains("http"), "{}", err);
    }

    #[test]
    fn load_reads_explicit_toml_file() {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            f,
            "server_url = \"http://10.0.0.5:9000\"\n\
             request_timeout_secs = 45\n\
             output_dir = \"/tmp/exports\""
        )
        .expect("write config");

        let s = Settings::load(Some(f.path())).expect("config should load");
        assert_eq!(s.server_url, "http://10.0.0.5:9000");
        assert_eq!(s.request_timeout_secs, Some(45));
        assert_eq!(s.output_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(s.log_dir, None);
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }

    #[test]
    fn load_rejects_invalid_server_url() {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(f, "server_url = \"::nope::\"").expect("write config");
        let err = Settings::load(Some(f.path())).expect_err("invalid url");
        assert!(matches!(err, WizardError::Config(_)));
    }

    #[test]
    fn to_toml_omits_unset_optionals() {
        let rendered = Settings::default().to_toml().expect("render");
        assert!(rendered.contains("server_url = \"http://127.0.0.1:3000\""));
        assert!(!rendered.contains("request_timeout_secs"));
    }
}

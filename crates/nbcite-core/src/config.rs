use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NbciteError, Result};

/// Root application configuration, loaded from `~/.config/nbcite/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub output: OutputConfig,
    pub normalize: NormalizeConfig,
}

/// The reference provider whose identifiers are embedded in marker hrefs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub indent: usize,
    pub trailing_newline: bool,
}

/// External command run on the notebook after it has been rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub enabled: bool,
    pub program: String,
    pub args: Vec<String>,
    /// Fail the run when the command cannot be spawned or exits non-zero.
    pub strict: bool,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            tag: "zotero".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            indent: 1,
            trailing_newline: true,
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "jupyter".to_string(),
            args: vec![
                "nbconvert".to_string(),
                "--ClearMetadataPreprocessor.enabled=True".to_string(),
                "--inplace".to_string(),
            ],
            strict: false,
        }
    }
}

impl ProviderConfig {
    /// Separator that precedes the external identifier in a decoded href,
    /// e.g. `zotero|`.
    pub fn separator(&self) -> String {
        format!("{}|", self.tag)
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/nbcite/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NBCITE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("nbcite")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.provider.tag.trim().is_empty() {
            return Err(NbciteError::Config("provider.tag must not be empty".to_string()));
        }
        if self.normalize.enabled && self.normalize.program.trim().is_empty() {
            return Err(NbciteError::Config(
                "normalize.program must be set when normalization is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.provider.tag, "zotero");
        assert_eq!(cfg.provider.separator(), "zotero|");
        assert_eq!(cfg.output.indent, 1);
        assert_eq!(cfg.normalize.program, "jupyter");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.normalize.strict = true;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.provider.tag, cfg.provider.tag);
        assert_eq!(loaded.normalize.args, cfg.normalize.args);
        assert!(loaded.normalize.strict);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[normalize]\nenabled = false\n").unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert!(!cfg.normalize.enabled);
        assert_eq!(cfg.normalize.program, "jupyter");
        assert_eq!(cfg.provider.tag, "zotero");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_nbcite_config.toml")).unwrap();
        assert_eq!(cfg.provider.tag, "zotero");
    }

    #[test]
    fn test_empty_provider_tag_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provider]\ntag = \"\"\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, NbciteError::Config(_)));
    }
}

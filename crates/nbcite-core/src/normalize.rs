use std::path::Path;
use std::process::Command;

use crate::config::NormalizeConfig;
use crate::error::{NbciteError, Result};

/// Post-write cleanup of a notebook file, performed in place.
pub trait NotebookNormalizer {
    fn normalize(&self, path: &Path) -> Result<()>;
}

/// Runs `jupyter nbconvert --ClearMetadataPreprocessor.enabled=True --inplace <path>`
/// (or whatever command is configured) and waits for it to finish.
#[derive(Debug, Clone)]
pub struct NbconvertNormalizer {
    program: String,
    args: Vec<String>,
}

impl NbconvertNormalizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl Default for NbconvertNormalizer {
    fn default() -> Self {
        Self::from_config(&NormalizeConfig::default())
    }
}

impl NotebookNormalizer for NbconvertNormalizer {
    fn normalize(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    NbciteError::Normalize(format!("{} is not installed", self.program))
                } else {
                    NbciteError::Normalize(format!("failed to run {}: {e}", self.program))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                format!("{} exited with {}: {stderr}", self.program, output.status)
            };
            return Err(NbciteError::Normalize(message));
        }

        Ok(())
    }
}

/// Leaves the file as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNormalizer;

impl NotebookNormalizer for NoopNormalizer {
    fn normalize(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

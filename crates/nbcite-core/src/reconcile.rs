//! Rebuild cell-level citation metadata from the `<cite>` markers in markdown text.
//!
//! For every markdown cell the markers are scanned and each cite id whose entry
//! under `metadata.citation-manager.citations` is missing or an empty list gets
//! `[{"id": <external-id>, "source": <provider>}]`. Existing non-empty entries
//! are never touched, so running twice changes nothing the second time.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::citation::{CITATION_MANAGER_KEY, CITATIONS_KEY, CitationRecord};
use crate::config::{AppConfig, OutputConfig, ProviderConfig};
use crate::error::Result;
use crate::marker::scan_markers;
use crate::normalize::{NbconvertNormalizer, NotebookNormalizer};
use crate::notebook::{self, Notebook};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedCitation {
    pub cite_id: String,
    pub external_id: String,
}

/// Citations written into one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellChange {
    pub cell_index: usize,
    pub fixed: Vec<FixedCitation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The notebook was rewritten.
    Written,
    /// Changes were computed but not written.
    DryRun,
    /// Nothing was read or written.
    FileNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum NormalizeStatus {
    Skipped,
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub path: PathBuf,
    pub outcome: ReconcileOutcome,
    pub changes: Vec<CellChange>,
    pub normalize: NormalizeStatus,
}

impl ReconcileReport {
    fn not_found(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: ReconcileOutcome::FileNotFound,
            changes: Vec::new(),
            normalize: NormalizeStatus::Skipped,
        }
    }

    /// Total citation entries written across all cells.
    pub fn citations_fixed(&self) -> usize {
        self.changes.iter().map(|c| c.fixed.len()).sum()
    }

    /// Number of cells that received at least one citation entry.
    pub fn cells_updated(&self) -> usize {
        self.changes.len()
    }
}

/// Reconcile a single cell in place.
///
/// Returns `None` for non-markdown cells, cells without markers, and cells
/// whose citations were all already present.
pub fn reconcile_cell(
    cell_index: usize,
    cell: &mut Value,
    provider: &ProviderConfig,
) -> Result<Option<CellChange>> {
    if !notebook::is_markdown(cell) {
        return Ok(None);
    }

    let markers = scan_markers(&notebook::source_text(cell));
    if markers.is_empty() {
        return Ok(None);
    }

    let citations =
        notebook::ensure_metadata_path(cell_index, cell, &[CITATION_MANAGER_KEY, CITATIONS_KEY])?;
    let separator = provider.separator();

    let mut fixed = Vec::new();
    for marker in markers {
        let Some(external_id) = marker.external_id(&separator) else {
            trace!(cell_index, cite_id = %marker.cite_id, href = %marker.href, "href has no provider marker");
            continue;
        };

        let needs_fix = match citations.get(&marker.cite_id) {
            None => true,
            Some(Value::Array(entries)) => entries.is_empty(),
            Some(_) => false,
        };
        if !needs_fix {
            continue;
        }

        let record = CitationRecord::new(external_id, provider.tag.clone());
        citations.insert(marker.cite_id.clone(), record.to_entry());
        debug!(cell_index, cite_id = %marker.cite_id, external_id = %record.id, "fixed citation");
        fixed.push(FixedCitation {
            cite_id: marker.cite_id,
            external_id: record.id,
        });
    }

    if fixed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(CellChange { cell_index, fixed }))
    }
}

/// Reconcile every cell of an in-memory notebook, in document order.
pub fn reconcile_notebook(nb: &mut Notebook, provider: &ProviderConfig) -> Result<Vec<CellChange>> {
    let mut changes = Vec::new();
    for (index, cell) in nb.cells_mut().iter_mut().enumerate() {
        if let Some(change) = reconcile_cell(index, cell, provider)? {
            changes.push(change);
        }
    }
    Ok(changes)
}

/// Reads, repairs, writes and normalizes notebook files.
pub struct Reconciler {
    provider: ProviderConfig,
    output: OutputConfig,
    normalizer: Option<Box<dyn NotebookNormalizer>>,
    strict_normalize: bool,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(config: &AppConfig) -> Self {
        let normalizer: Option<Box<dyn NotebookNormalizer>> = if config.normalize.enabled {
            Some(Box::new(NbconvertNormalizer::from_config(&config.normalize)))
        } else {
            None
        };

        Self {
            provider: config.provider.clone(),
            output: config.output.clone(),
            normalizer,
            strict_normalize: config.normalize.strict,
            dry_run: false,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn NotebookNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn without_normalizer(mut self) -> Self {
        self.normalizer = None;
        self
    }

    pub fn strict_normalize(mut self, strict: bool) -> Self {
        self.strict_normalize = strict;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Repair the notebook at `path`.
    ///
    /// A missing file is not an error: it yields a report with
    /// [`ReconcileOutcome::FileNotFound`] and leaves the filesystem untouched.
    pub fn reconcile(&self, path: &Path) -> Result<ReconcileReport> {
        if !path.exists() {
            warn!(path = %path.display(), "notebook not found");
            return Ok(ReconcileReport::not_found(path));
        }

        info!(path = %path.display(), "reading notebook");
        let mut nb = Notebook::load(path)?;
        let changes = reconcile_notebook(&mut nb, &self.provider)?;

        let mut report = ReconcileReport {
            path: path.to_path_buf(),
            outcome: ReconcileOutcome::DryRun,
            changes,
            normalize: NormalizeStatus::Skipped,
        };
        if self.dry_run {
            info!(citations = report.citations_fixed(), "dry run, notebook left unchanged");
            return Ok(report);
        }

        info!(path = %path.display(), "writing notebook");
        nb.save(path, self.output.indent, self.output.trailing_newline)?;
        report.outcome = ReconcileOutcome::Written;

        if let Some(normalizer) = &self.normalizer {
            report.normalize = match normalizer.normalize(path) {
                Ok(()) => NormalizeStatus::Done,
                Err(e) if self.strict_normalize => return Err(e),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "notebook normalization failed");
                    NormalizeStatus::Failed(e.to_string())
                }
            };
        }

        Ok(report)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(&AppConfig::default())
    }
}

/// Repair the notebook at `path` with the default configuration, including
/// the `jupyter nbconvert` cleanup step.
pub fn reconcile(path: &Path) -> Result<ReconcileReport> {
    Reconciler::default().reconcile(path)
}

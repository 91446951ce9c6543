//! nbcite core: repair citation-manager metadata in Jupyter notebooks.

pub mod citation;
pub mod config;
pub mod error;
pub mod marker;
pub mod normalize;
pub mod notebook;
pub mod reconcile;

pub use citation::CitationRecord;
pub use config::{AppConfig, NormalizeConfig, OutputConfig, ProviderConfig};
pub use error::{ExitCode, NbciteError, Result};
pub use marker::{CitationMarker, scan_markers};
pub use normalize::{NbconvertNormalizer, NoopNormalizer, NotebookNormalizer};
pub use notebook::Notebook;
pub use reconcile::{
    CellChange, FixedCitation, NormalizeStatus, ReconcileOutcome, ReconcileReport, Reconciler,
    reconcile, reconcile_cell, reconcile_notebook,
};

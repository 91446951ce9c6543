use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nbcite_core::{AppConfig, ExitCode, NormalizeStatus, ReconcileOutcome, ReconcileReport, Reconciler};

const RULE: &str = "============================================================";

const LONG_ABOUT: &str = "\
Fix jupyterlab-citation-manager metadata in a Jupyter notebook.

Scans markdown cells for <cite id=\"...\"><a href=\"#zotero%7C...\"> markers and
restores the matching entries under metadata.citation-manager.citations when
they are missing or empty. Existing entries are never overwritten.

After running:
  1. Open the notebook in JupyterLab
  2. Use the citation-manager plugin to REFRESH the bibliography
  3. This syncs the notebook-level Zotero items from your Zotero library";

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "nbcite",
    about = "Repair citation-manager metadata in Jupyter notebooks",
    version,
    long_about = LONG_ABOUT
)]
struct Cli {
    /// Path to the .ipynb notebook to fix (rewritten in place).
    notebook: PathBuf,

    /// Output in JSON format. Also enabled by setting NBCITE_JSON=1.
    #[arg(long)]
    json: bool,

    /// Report what would be fixed without writing the notebook.
    #[arg(long)]
    dry_run: bool,

    /// Skip the `jupyter nbconvert` cleanup after writing.
    #[arg(long)]
    no_normalize: bool,

    /// Config file (defaults to $NBCITE_CONFIG or ~/.config/nbcite/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(short, long)]
    verbose: bool,
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let (code, text) = usage_error(e.kind());
            println!("{text}");
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = &result {
        eprintln!("Error: {e:?}");
    }
    std::process::exit(exit_code(&result));
}

fn run(cli: Cli) -> Result<()> {
    let start = Instant::now();
    let json_output = cli.json || std::env::var("NBCITE_JSON").as_deref() == Ok("1");

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = AppConfig::load_from(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    debug!(
        path = %config_path.display(),
        exists = config_path.exists(),
        provider = %config.provider.tag,
        normalize = config.normalize.enabled && !cli.no_normalize,
        "config loaded"
    );

    let mut reconciler = Reconciler::new(&config).dry_run(cli.dry_run);
    if cli.no_normalize {
        reconciler = reconciler.without_normalizer();
    }

    let report = reconciler
        .reconcile(&cli.notebook)
        .with_context(|| format!("fixing citations in {}", cli.notebook.display()))?;
    let dur = start.elapsed().as_millis();

    if json_output {
        if report.outcome == ReconcileOutcome::FileNotFound {
            print_json(&serde_json::json!({
                "status": "error",
                "error": "not_found",
                "message": format!("File not found: {}", report.path.display()),
                "meta": { "duration_ms": dur }
            }))?;
        } else {
            print_json(&serde_json::json!({
                "status": "ok",
                "data": {
                    "report": report,
                    "cells_updated": report.cells_updated(),
                    "citations_fixed": report.citations_fixed(),
                },
                "meta": { "duration_ms": dur }
            }))?;
        }
    } else {
        print!("{}", format_report(&report));
        if let NormalizeStatus::Failed(message) = &report.normalize {
            eprintln!("Warning: notebook cleanup failed: {message}");
        }
    }

    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────────────

/// Human-readable summary of a run, as printed on stdout.
fn format_report(report: &ReconcileReport) -> String {
    let mut out = String::new();
    if report.outcome == ReconcileOutcome::FileNotFound {
        let _ = writeln!(out, "Error: File not found: {}", report.path.display());
        let _ = writeln!(out, "\nNo citations needed fixing - all metadata is already correct!");
        return out;
    }

    for change in &report.changes {
        for fixed in &change.fixed {
            let _ = writeln!(
                out,
                "  Cell {}: Fixed citation '{}' -> {}",
                change.cell_index, fixed.cite_id, fixed.external_id
            );
        }
    }

    let _ = writeln!(out, "\n{RULE}");
    match report.outcome {
        ReconcileOutcome::DryRun => {
            let _ = writeln!(out, "○ Dry run, {} left unchanged", report.path.display());
        }
        _ => {
            let _ = writeln!(out, "✓ Successfully updated {}", report.path.display());
        }
    }
    let _ = writeln!(out, "  - Cells updated: {}", report.cells_updated());
    let _ = writeln!(out, "  - Citations fixed: {}", report.citations_fixed());
    let _ = writeln!(out, "{RULE}");

    if report.citations_fixed() > 0 {
        let _ = writeln!(out, "\n{RULE}");
        let _ = writeln!(out, "NEXT STEPS:");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "1. Open the notebook in JupyterLab");
        let _ = writeln!(out, "2. Use the citation-manager plugin to REFRESH/SYNC");
        let _ = writeln!(out, "3. This will update the bibliography with Zotero data");
        let _ = writeln!(out, "{RULE}");
    } else {
        let _ = writeln!(out, "\nNo citations needed fixing - all metadata is already correct!");
    }
    out
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Exit code and stdout text for an argument error.
fn usage_error(kind: ErrorKind) -> (i32, String) {
    let mut text = Cli::command().render_long_help().to_string();
    match kind {
        ErrorKind::MissingRequiredArgument | ErrorKind::UnknownArgument => {
            text.push_str("\n\nError: Please provide a notebook path");
        }
        other => {
            let _ = write!(text, "\n\nError: {other}");
        }
    }
    text.push_str("\nUsage: nbcite <notebook_path>");
    (ExitCode::InvalidArgs as i32, text)
}

fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => ExitCode::Success as i32,
        Err(_) => ExitCode::GeneralError as i32,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nbcite_core={level},nbcite_cli={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn single_positional_is_accepted() {
        let cli = Cli::try_parse_from(["nbcite", "article.ipynb"]).unwrap();
        assert_eq!(cli.notebook, PathBuf::from("article.ipynb"));
        assert!(!cli.dry_run);
        assert!(!cli.no_normalize);
    }

    #[test]
    fn flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "nbcite",
            "--dry-run",
            "--no-normalize",
            "--json",
            "--config",
            "cfg.toml",
            "nb.ipynb",
        ])
        .unwrap();
        assert!(cli.dry_run && cli.no_normalize && cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.toml")));
    }

    #[test]
    fn missing_path_is_a_usage_error() {
        let err = Cli::try_parse_from(["nbcite"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn extra_path_is_a_usage_error() {
        let err = Cli::try_parse_from(["nbcite", "a.ipynb", "b.ipynb"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn wrong_argument_count_exits_1_with_help() {
        for args in [vec!["nbcite"], vec!["nbcite", "a.ipynb", "b.ipynb"]] {
            let err = Cli::try_parse_from(args).err().unwrap();
            let (code, text) = usage_error(err.kind());
            assert_eq!(code, 1);
            assert!(text.contains("Fix jupyterlab-citation-manager metadata"));
            assert!(text.contains("Error: Please provide a notebook path"));
            assert!(text.ends_with("Usage: nbcite <notebook_path>"));
        }
    }

    #[test]
    fn missing_file_exits_0_with_no_fix_message() {
        let dir = TempDir::new().unwrap();
        let notebook = dir.path().join("missing.ipynb");
        let cli = cli_for(&dir, &notebook);

        let result = run(cli);
        assert_eq!(exit_code(&result), 0);
        assert!(!notebook.exists());

        let report = Reconciler::default()
            .without_normalizer()
            .reconcile(&notebook)
            .unwrap();
        let text = format_report(&report);
        assert!(text.starts_with(&format!("Error: File not found: {}", notebook.display())));
        assert!(text.contains("No citations needed fixing - all metadata is already correct!"));
    }

    #[test]
    fn malformed_notebook_exits_2() {
        let dir = TempDir::new().unwrap();
        let notebook = dir.path().join("broken.ipynb");
        fs::write(&notebook, r#"{"nbformat": 4}"#).unwrap();

        let result = run(cli_for(&dir, &notebook));
        assert!(result.is_err());
        assert_eq!(exit_code(&result), 2);
    }

    #[test]
    fn fixed_citations_exit_0_and_list_next_steps() {
        let dir = TempDir::new().unwrap();
        let notebook = dir.path().join("article.ipynb");
        fs::write(
            &notebook,
            serde_json::json!({"cells": [{
                "cell_type": "markdown",
                "source": r##"Citing <cite id="c1"><a href="#zotero%7C111%2FABC">text</a></cite>"##
            }]})
            .to_string(),
        )
        .unwrap();

        let report = Reconciler::default()
            .without_normalizer()
            .dry_run(true)
            .reconcile(&notebook)
            .unwrap();
        let text = format_report(&report);
        assert!(text.contains("  Cell 0: Fixed citation 'c1' -> 111/ABC"));
        assert!(text.contains("  - Citations fixed: 1"));
        assert!(text.contains("NEXT STEPS:"));
        assert!(!text.contains("Reading notebook"));
        assert!(!text.contains("Writing updated notebook"));

        assert_eq!(exit_code(&run(cli_for(&dir, &notebook))), 0);
        let written = fs::read_to_string(&notebook).unwrap();
        assert!(written.contains("\"source\": \"zotero\""));
    }

    /// Parse a CLI invocation that ignores the user's config and skips nbconvert.
    fn cli_for(dir: &TempDir, notebook: &Path) -> Cli {
        let config = dir.path().join("no-config.toml");
        Cli::try_parse_from([
            OsStr::new("nbcite"),
            OsStr::new("--no-normalize"),
            OsStr::new("--config"),
            config.as_os_str(),
            notebook.as_os_str(),
        ])
        .unwrap()
    }
}

//! Output formatting: structured document, text report, CSV export, and
//! the writers that put them on stdout or disk.

pub mod csv_export;
pub mod document;
pub mod text;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::result_set::ResultSet;

pub use csv_export::export_csv;
pub use document::{render_document, SCHEMA_VERSION};
pub use text::{format_value, metric_line, render_report, write_report};

/// Both renderings of one result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Structured JSON document.
    pub document: String,
    /// Human-readable report.
    pub report: String,
}

/// Render the document and the report. Partial result sets render what
/// they contain.
pub fn render(set: &ResultSet) -> Result<Rendered> {
    let document = render_document(set).context("failed to serialize result document")?;
    let report = render_report(set).context("failed to render text report")?;
    Ok(Rendered { document, report })
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Write to `path` when given, otherwise to stdout.
pub fn emit(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => write_file(p, content),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("failed to write to stdout")?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n").context("failed to write to stdout")?;
            }
            stdout.flush().context("failed to flush stdout")
        }
    }
}

//! File exporters: SVG and draw.io diagrams of the relationship graph, a JSON
//! report of related rows and a CSV listing of relations.

mod csv;
mod drawio;
mod json;
mod svg;

use anyhow::{Context, Result};
use std::path::Path;

pub use self::csv::export_relations_csv;
pub use drawio::export_drawio;
pub use json::export_report;
pub use svg::write_svg;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Svg,
    Drawio,
    Json,
    Csv,
}

impl ExportFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "svg" => Some(Self::Svg),
            "drawio" | "xml" => Some(Self::Drawio),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Drawio => "drawio",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Write a whole export in one call
fn write_file(output_path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(output_path, bytes)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.DRAWIO")), Some(ExportFormat::Drawio));
        assert_eq!(ExportFormat::from_path(Path::new("out.svg")), Some(ExportFormat::Svg));
        assert_eq!(ExportFormat::from_path(Path::new("out")), None);
    }
}

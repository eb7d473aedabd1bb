use super::write_file;
use crate::layout::LayoutEngine;
use crate::types::RelationsSnapshot;
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// SVG image of the graph as drawn by Graphviz, `None` when `dot` failed
pub fn export_svg(
    engine: &mut LayoutEngine,
    snapshot: &RelationsSnapshot,
    highlight: &HashSet<String>,
    focus: &HashSet<String>,
) -> Option<Vec<u8>> {
    engine.render_svg(snapshot, highlight, focus)
}

/// Render and write the SVG, reporting the engine diagnostic on failure
pub fn write_svg(
    engine: &mut LayoutEngine,
    snapshot: &RelationsSnapshot,
    highlight: &HashSet<String>,
    focus: &HashSet<String>,
    output_path: &Path,
) -> Result<()> {
    let bytes = export_svg(engine, snapshot, highlight, focus)
        .ok_or_else(|| anyhow!("SVG export failed: {}", engine.last_error()))?;
    write_file(output_path, &bytes)?;
    info!(path = %output_path.display(), bytes = bytes.len(), "exported SVG");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_leaves_no_file_and_reports_the_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("graph.svg");
        let mut engine = LayoutEngine::new(Some(dir.path().join("missing-dot")));

        let err = write_svg(
            &mut engine,
            &RelationsSnapshot::default(),
            &HashSet::new(),
            &HashSet::new(),
            &out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing-dot"));
        assert!(!out.exists());
    }
}

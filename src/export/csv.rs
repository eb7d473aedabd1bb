use crate::types::RelationsSnapshot;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

const HEADER: [&str; 6] = [
    "relation_id",
    "parent_layer",
    "parent_field",
    "child_layer",
    "child_field",
    "child_is_link_table",
];

/// One CSV row per field pair of every relation
pub fn write_relations_csv<W: Write>(snapshot: &RelationsSnapshot, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(HEADER)
        .context("Failed to write CSV header")?;

    for edge in &snapshot.edges {
        let link = snapshot
            .layer(&edge.child_layer_id)
            .map(|l| l.is_link_table)
            .unwrap_or(false);
        for pair in &edge.pairs {
            writer
                .write_record([
                    edge.id.as_str(),
                    snapshot.layer_name(&edge.parent_layer_id),
                    pair.parent_field.as_str(),
                    snapshot.layer_name(&edge.child_layer_id),
                    pair.child_field.as_str(),
                    if link { "true" } else { "false" },
                ])
                .context("Failed to write CSV row")?;
        }
    }

    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

pub fn export_relations_csv(snapshot: &RelationsSnapshot, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;
    write_relations_csv(snapshot, file)?;
    info!(path = %output_path.display(), relations = snapshot.edges.len(), "exported relation listing");
    Ok(())
}

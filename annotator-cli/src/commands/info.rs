use annotator::SnapshotEngine;
use anyhow::{Context, Result};

use super::EngineArgs;

pub fn run(engine: &EngineArgs) -> Result<()> {
    let extract = engine.extract_path()?;

    let metadata = std::fs::metadata(extract)
        .with_context(|| format!("Extract not found: {}", extract.display()))?;

    let snapshot = SnapshotEngine::load_extract(extract, engine.tag_file.as_deref())
        .context("Failed to load extract")?;
    let stats = snapshot.stats();

    println!("Extract:    {}", extract.display());
    println!("File size:  {} bytes", metadata.len());
    match &engine.tag_file {
        Some(path) => println!("Tag file:   {}", path.display()),
        None => println!("Tag file:   (all tags kept)"),
    }
    println!("Nodes:      {}", stats.nodes);
    println!("Ways:       {}", stats.ways);
    println!("Segments:   {}", stats.segments);

    Ok(())
}

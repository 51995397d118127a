use annotator::query;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::EngineArgs;

/// One line of the JSON lines output.
#[derive(Serialize)]
struct BatchLine<T: Serialize> {
    row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run(
    engine: &EngineArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    column: &str,
    positional: bool,
    projected: bool,
) -> Result<()> {
    let service = engine.build_service(positional, projected)?;

    let file = File::open(&input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let route_idx = headers
        .iter()
        .position(|h| h == column)
        .with_context(|| format!("Column '{}' not found in CSV", column))?;

    // Collect records for progress bar
    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let output_path = output.unwrap_or_else(|| default_output(&input));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);

    let mut failed = 0;
    for (row, record) in records.iter().enumerate() {
        let route = record.get(route_idx).unwrap_or("").replace(';', ",");

        let result = match query::parse_node_path(&route) {
            Ok(nodes) => service.annotate_nodes(nodes).await,
            Err(e) => Err(e),
        };

        let line = match result {
            Ok(annotation) => BatchLine {
                row,
                result: Some(annotation),
                error: None,
            },
            Err(e) => {
                failed += 1;
                BatchLine {
                    row,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        };
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    println!(
        "{} routes annotated ({} failed). Output written to: {}",
        records.len() - failed,
        failed,
        output_path.display()
    );
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "routes".to_string());
    input.with_file_name(format!("{}_annotated.jsonl", stem))
}

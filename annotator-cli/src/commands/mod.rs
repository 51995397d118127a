pub mod batch;
pub mod coords;
pub mod info;
pub mod nodes;

use annotator::{
    AnnotatorService, AnnotatorServiceBuilder, IndexMode, NodeShape, TagValue, WayTagsResponse,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Options shared by every command that loads the extract.
pub struct EngineArgs {
    pub extract: Option<PathBuf>,
    pub tag_file: Option<PathBuf>,
    pub concurrency: usize,
}

impl EngineArgs {
    pub fn extract_path(&self) -> Result<&PathBuf> {
        self.extract.as_ref().context(
            "ANNOTATOR_EXTRACT environment variable not set. Use --extract or set ANNOTATOR_EXTRACT",
        )
    }

    /// Load the extract and build a service with the given response settings.
    pub fn build_service(&self, positional: bool, projected: bool) -> Result<AnnotatorService> {
        let mut builder = AnnotatorServiceBuilder::new(self.extract_path()?)
            .concurrency(self.concurrency)
            .index_mode(if positional {
                IndexMode::Positional
            } else {
                IndexMode::Skip
            })
            .node_shape(if projected {
                NodeShape::Projected
            } else {
                NodeShape::Tags
            });

        if let Some(tag_file) = &self.tag_file {
            builder = builder.tag_file(tag_file);
        }

        builder.build().context("Failed to load extract")
    }
}

/// Print a full-tags response as plain text.
pub fn print_way_tags(response: &WayTagsResponse) {
    let indexes: Vec<String> = response
        .way_indexes
        .iter()
        .map(|i| i.map_or_else(|| "-".to_string(), |i| i.to_string()))
        .collect();
    println!("way_indexes: {}", indexes.join(" "));

    for (slot, record) in response.ways_seen.iter().enumerate() {
        match record {
            Some(record) => {
                let tags: Vec<String> = record
                    .tags()
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, format_value(v)))
                    .collect();
                println!("[{}] way {}: {}", slot, record.way_id, tags.join(", "));
            }
            None => println!("[{}] lookup failed", slot),
        }
    }
}

fn format_value(value: &TagValue) -> String {
    match value {
        TagValue::Text(s) => s.clone(),
        TagValue::Flag(b) => b.to_string(),
        TagValue::Missing => "null".to_string(),
    }
}

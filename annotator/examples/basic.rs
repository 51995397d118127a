//! Basic example demonstrating annotator library usage.
//!
//! Run with: cargo run --example basic -- /path/to/extract.json 1,2,3

use annotator::{query, AnnotatorError, AnnotatorServiceBuilder, IndexMode};
use std::env;

#[tokio::main]
async fn main() -> Result<(), AnnotatorError> {
    let mut args = env::args().skip(1);
    let (extract, route) = match (args.next(), args.next()) {
        (Some(extract), Some(route)) => (extract, route),
        _ => {
            eprintln!("Usage: cargo run --example basic -- /path/to/extract.json 1,2,3");
            std::process::exit(1);
        }
    };

    let nodes = query::parse_node_path(&route)?;

    for mode in [IndexMode::Skip, IndexMode::Positional] {
        let service = AnnotatorServiceBuilder::new(&extract)
            .index_mode(mode)
            .build()?;

        let annotation = service.annotate_nodes(nodes.clone()).await?;
        println!("{mode}:");
        println!("{}", serde_json::to_string_pretty(&annotation)?);
    }

    Ok(())
}

use annotator::{query, Annotation};
use anyhow::{Context, Result};

use super::{print_way_tags, EngineArgs};

pub async fn run(
    engine: &EngineArgs,
    route: &str,
    positional: bool,
    projected: bool,
    json: bool,
) -> Result<()> {
    let nodes = query::parse_node_path(route).context("Invalid node list")?;
    let service = engine.build_service(positional, projected)?;

    let annotation = service
        .annotate_nodes(nodes)
        .await
        .context("Failed to annotate route")?;

    if json {
        println!("{}", serde_json::to_string(&annotation)?);
        return Ok(());
    }

    match &annotation {
        Annotation::Tags(response) => print_way_tags(response),
        Annotation::Projected(response) => {
            println!(
                "{:<6} {:>10} {:>24} {:>7} {:>7}",
                "POS", "MAXSPEED", "CONDITIONAL", "TUNNEL", "BRIDGE"
            );
            println!("{}", "-".repeat(58));
            for (pos, entry) in response.tags.iter().enumerate() {
                match entry {
                    Some(tags) => println!(
                        "{:<6} {:>10} {:>24} {:>7} {:>7}",
                        pos,
                        tags.0.as_deref().unwrap_or("-"),
                        tags.1.as_deref().unwrap_or("-"),
                        tags.2,
                        tags.3
                    ),
                    None => println!("{:<6} {:>10}", pos, "-"),
                }
            }
        }
    }

    Ok(())
}

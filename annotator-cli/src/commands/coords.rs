use annotator::query;
use anyhow::{Context, Result};

use super::{print_way_tags, EngineArgs};

pub async fn run(engine: &EngineArgs, route: &str, positional: bool, json: bool) -> Result<()> {
    let coords = query::parse_coordinate_path(route).context("Invalid coordinate list")?;
    let service = engine.build_service(positional, false)?;

    let response = service
        .annotate_coordinates(coords)
        .await
        .context("Failed to annotate route")?;

    if json {
        println!("{}", serde_json::to_string(&response)?);
    } else {
        print_way_tags(&response);
    }

    Ok(())
}

//! Annotator Service - HTTP microservice for route way annotation.
//!
//! Resolves routes given as node ids or coordinates into the tags of the
//! ways they traverse.
//!
//! ## Usage
//!
//! ```text
//! annotator-service [EXTRACT] [TAG FILE]
//! ```
//!
//! Positional arguments take precedence over the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ANNOTATOR_EXTRACT` | Extract snapshot path | Required (or first argument) |
//! | `ANNOTATOR_TAG_FILE` | Tag filter file | None (or second argument) |
//! | `ANNOTATOR_PORT` | HTTP server port | 5052 |
//! | `ANNOTATOR_CONCURRENCY` | Tag lookups in flight per request | 16 |
//! | `ANNOTATOR_FETCH_TIMEOUT_MS` | Deadline per tag lookup | 2000 |
//! | `ANNOTATOR_RESOLVE_TIMEOUT_MS` | Deadline per route resolution | 10000 |
//! | `ANNOTATOR_INDEX_MODE` | `skip` or `positional` | skip |
//! | `ANNOTATOR_NODE_SHAPE` | `tags` or `projected` | tags |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `POST /nodelist` - Annotate `{"nodes": [...]}`
//! - `GET /nodelist/{ids}` - Annotate comma-separated node ids
//! - `POST /coordlist` - Annotate `{"coordinates": [[lon, lat], ...]}`
//! - `GET /coordlist/{pairs}` - Annotate `lon,lat;lon,lat`
//! - `GET /health` - Health check
//! - `GET /stats` - Request and lookup counters
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use annotator::{AnnotatorError, AnnotatorServiceBuilder};
use annotator_service::{handlers, router, AppState};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Default HTTP port.
const DEFAULT_PORT: u16 = 5052;

/// OpenAPI documentation for the annotator service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Way Annotator Service",
        version = "0.1.0",
        description = "Annotates routes with the tags of the ways they traverse.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::post_nodelist,
        handlers::get_nodelist,
        handlers::post_coordlist,
        handlers::get_coordlist,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(
        schemas(
            handlers::NodeListRequest,
            handlers::CoordListRequest,
            handlers::HealthResponse,
            handlers::StatsResponse,
        )
    ),
    tags(
        (name = "annotation", description = "Route annotation endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "annotator_service=info,annotator=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("ANNOTATOR_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let builder = configure(std::env::args().skip(1).collect())?;

    tracing::info!(
        extract = %builder.extract_path().display(),
        tag_file = ?builder.tag_file_path(),
        port = port,
        "Loading extract"
    );

    // No request is served before the extract has loaded; a load failure
    // aborts startup.
    let annotator = tokio::task::spawn_blocking(move || builder.build()).await??;

    tracing::info!(
        concurrency = annotator.fetcher().concurrency(),
        fetch_timeout_ms = annotator.fetcher().timeout().as_millis() as u64,
        index_mode = %annotator.index_mode(),
        node_shape = %annotator.node_shape(),
        "Starting annotator service"
    );

    let state = Arc::new(AppState { annotator });

    let app = router(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Combine positional arguments with the environment configuration.
///
/// `args` are `[EXTRACT] [TAG FILE]`; either overrides its environment
/// variable.
fn configure(args: Vec<String>) -> Result<AnnotatorServiceBuilder, AnnotatorError> {
    let mut args = args.into_iter();

    let extract = args
        .next()
        .or_else(|| std::env::var("ANNOTATOR_EXTRACT").ok())
        .ok_or_else(|| AnnotatorError::Config {
            reason: "usage: annotator-service EXTRACT [TAG FILE], or set ANNOTATOR_EXTRACT"
                .to_string(),
        })?;

    let mut builder = AnnotatorServiceBuilder::new(extract).with_env()?;

    if let Some(tag_file) = args.next() {
        builder = builder.tag_file(tag_file);
    }

    Ok(builder)
}

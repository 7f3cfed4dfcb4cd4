use std::sync::Arc;

use clap::Parser;
use scootnav::{
    AppState, config::Args, create_router, poi_client::OverpassClient,
    routing_client::OsrmClient,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scootnav=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let routes = OsrmClient::new(&args.osrm_url, &args.osrm_profile, args.http_timeout())?;
    let pois = OverpassClient::new(&args.overpass_url, args.http_timeout())?;
    tracing::info!(
        "routing via {} ({}), POIs via {}",
        args.osrm_url,
        args.osrm_profile,
        args.overpass_url
    );

    let state = AppState::new(
        Arc::new(routes),
        Arc::new(pois),
        args.navigation_config(),
        args.poi_cache_config(),
    )?;
    let app = create_router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!("scootnav listening on http://{}", args.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {err}");
            }
        })
        .await?;

    state.shutdown();
    tracing::info!("scootnav stopped");
    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use geoqa::agent::Agent;
use geoqa::backends::{NominatimClient, OpenRouterClient, SyntheticImageryBackend, TavilyClient};
use geoqa::config::AppConfig;
use geoqa::dispatch::{DispatchConfig, ServiceDispatcher};
use geoqa::engine::AnalysisEngine;
use geoqa::intent::IntentClassifier;
use geoqa::location::LocationParser;
use geoqa::synth::ResponseSynthesizer;
use geoqa::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("geoqa=debug".parse()?))
        .init();

    info!("Starting geoqa backend");

    let config = AppConfig::from_env()?;

    // One shared connection pool per external endpoint kind, reused across
    // requests.
    let http = reqwest::Client::new();

    let openrouter = Arc::new(OpenRouterClient::new(
        http.clone(),
        config.openrouter_api_key.clone(),
        config.openrouter_intent_model.clone(),
    ));
    let nominatim = Arc::new(NominatimClient::new(http.clone(), config.nominatim_url.clone(), config.max_roi_km2));
    let tavily = Arc::new(TavilyClient::new(http.clone(), config.tavily_api_key.clone()));
    let imagery: Arc<dyn geoqa::backends::ImageryBackend> = Arc::new(SyntheticImageryBackend::new());

    let location_parser = LocationParser::new(openrouter.clone(), nominatim, Duration::from_secs(8));
    let intent_classifier = IntentClassifier::new(openrouter, Duration::from_secs(15));
    let engine = Arc::new(AnalysisEngine::new(imagery, config.grid_max_concurrency));
    let synthesizer = Arc::new(ResponseSynthesizer::new(tavily));
    let dispatcher = ServiceDispatcher::new(
        engine,
        synthesizer,
        None,
        DispatchConfig {
            max_roi_km2: config.max_roi_km2,
            read_timeout_cap_secs: config.engine_deadline_secs,
        },
    );

    let agent = Arc::new(Agent::new(location_parser, intent_classifier, dispatcher));
    let state = AppState { agent };

    let request_timeout = Duration::from_secs(config.engine_deadline_secs + 30);
    let app = build_router(state, request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

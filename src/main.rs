use anyhow::Context;
use clap::Parser;
use saju_gateway::cache::FortuneCache;
use saju_gateway::config::AppConfig;
use saju_gateway::gateway::{app, ApiKeySource, AppState};
use saju_gateway::prompt::PERSONA;
use saju_gateway::provider::GeminiClient;
use saju_gateway::router::FallbackRouter;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "saju-gateway", about = "Fortune-telling front end for the Gemini API")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saju_gateway=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config)).context("loading configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;

    let generator = GeminiClient::new(
        config.gemini.base_url.clone(),
        config.gemini.timeout_secs.map(Duration::from_secs),
    );
    let router = FallbackRouter::new(Arc::new(generator), config.gemini.models.clone());
    let cache = FortuneCache::new(config.cache.capacity, config.cache.ttl_secs);

    let state = Arc::new(AppState {
        router: Arc::new(router),
        cache: Arc::new(cache),
        api_key: ApiKeySource::Env(config.gemini.api_key_env.clone()),
        persona: PERSONA.to_string(),
        retry_after_secs: config.rate_limit.retry_after_secs,
    });

    if std::env::var(&config.gemini.api_key_env).is_err() {
        tracing::warn!(
            var = %config.gemini.api_key_env,
            "api key not set; requests will fail until it is"
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        addr = %addr,
        upstream = %config.gemini.base_url,
        models = state.router.models().len(),
        cache_ttl_secs = config.cache.ttl_secs,
        "saju gateway listening"
    );

    axum::serve(listener, app(state)).await?;
    Ok(())
}

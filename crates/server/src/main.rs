use anyhow::Result;
use survey_chat_server::{AppState, ServerConfig, router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey_chat_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!("Starting survey server on {}", config.addr());
    if config.anthropic_api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY is not set, chat and suggestions are disabled");
    }
    if config.sheets.is_none() {
        tracing::warn!("Google Sheets credentials not configured, transcripts are not saved");
    }
    if config.voice.is_none() {
        tracing::warn!("ElevenLabs credentials not configured, voice is disabled");
    }

    let app = router(AppState::from_config(&config)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

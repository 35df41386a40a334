use deskserver::config::AppConfig;
use deskserver::llm::OpenAiCompatClient;
use deskserver::notify::LogNotifier;
use deskserver::partners::StaticPartnerDirectory;
use deskserver::shared::state::AppState;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::load()?;
    if !config.completion.is_configured() {
        warn!("completion service not configured; Jey will hand off to agents");
    }

    let partners = match &config.partners.directory_path {
        Some(path) => Arc::new(StaticPartnerDirectory::from_file(Path::new(path))?),
        None => {
            warn!("no partner directory configured; suggestions will be empty");
            Arc::new(StaticPartnerDirectory::new(Vec::new()))
        }
    };
    let completion = Arc::new(OpenAiCompatClient::new(config.completion.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        partners,
        completion,
        Arc::new(LogNotifier),
    ));

    let app = deskserver::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("deskserver listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

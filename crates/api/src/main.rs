use std::net::SocketAddr;

use portal_api::AppConfig;
use portal_observability::Logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    portal_observability::init();

    let config = AppConfig::from_env()?;
    let app = portal_api::app::build_app(config.error_handling, Logger::tracing());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

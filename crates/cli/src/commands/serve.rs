//! `carebridge serve` — Start the HTTP API server.

use carebridge_config::AppConfig;

use crate::bootstrap;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let assistant = bootstrap::assistant(&config).await?;

    println!("CareBridge Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);

    carebridge_gateway::serve(&config.gateway.host, config.gateway.port, assistant).await?;

    Ok(())
}

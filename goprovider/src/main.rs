use goprovider::{GoProvider, ProviderConfig, PROVIDER_ADDRESS};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ProviderConfig::from_env()?;

    // stdout carries the plugin handshake, so logs go to stderr
    if let Some(level) = config.server.log_level.as_tracing() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    }

    tracing::info!(address = PROVIDER_ADDRESS, "Starting provider");

    let provider = GoProvider::new(config.interpreter);
    tfplug::serve(provider, config.server).await?;

    Ok(())
}

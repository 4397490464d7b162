//! NSM demo client
//!
//! Must be started by a session manager, which provides `NSM_URL`.
//! Usage: `nsm-demo [executable-name]`

use anyhow::Context;
use nsm_core::{install_sigterm_handler, Capability, ClientConfig, NsmClient, EXIT_OK};
use nsm_demo::DemoClient;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ClientConfig::from_env("NsmDemo").with_capabilities([
        Capability::Switch,
        Capability::Dirty,
        Capability::Progress,
        Capability::Message,
        Capability::OptionalGui,
    ])
    // failures are reported from main instead of exiting inside the engine
    .with_exit_on_close(false);
    if let Some(executable) = std::env::args().nth(1) {
        config = config.with_executable(executable);
    }

    let demo = Arc::new(DemoClient::new());
    let client = NsmClient::connect(config, demo.clone())
        .await
        .context("Failed to start NSM client")?;
    install_sigterm_handler(client.clone())?;

    client.init().await.context("Failed to join NSM session")?;
    info!("Running as {:?}", client.state().client_id);

    client.set_label("demo").await?;
    client.send_message("Demo client ready", 1).await?;

    demo.add_note(format!("started at {}", chrono::Utc::now().to_rfc3339()));
    client.set_dirty(true).await?;

    let status = client.wait_for_shutdown().await;
    if status != EXIT_OK {
        anyhow::bail!("NSM client shut down after a fatal error (status {})", status);
    }
    Ok(())
}

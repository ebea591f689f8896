use std::sync::Arc;

use anyhow::Context;

use gpeasy::backends::openai::OpenAI;
use gpeasy::proxy::Proxy;
use gpeasy::AppConfig;

pub async fn run(
    mut config: AppConfig,
    port: Option<u16>,
    bind: Option<String>,
    log_exchanges: bool,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.proxy.port = port;
    }
    if let Some(bind) = bind {
        config.proxy.bind_addr = bind;
    }
    config.proxy.log_exchanges |= log_exchanges;

    let backend = Arc::new(OpenAI::new(config.client.clone())?);
    log::info!("relaying to {}", backend.base_url());
    let proxy = Proxy::new(config.proxy, backend);
    let models = proxy
        .verify_upstream()
        .await
        .context("upstream did not answer the model listing")?;
    log::info!("upstream offers {models} models");

    proxy.serve(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

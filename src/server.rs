use crate::config::GateConfig;
use crate::credentials::CredentialStore;
use crate::middleware::{AuthGate, BypassSet};
use crate::proxy::{UpstreamProxy, forward};
use actix_web::{App, HttpServer, middleware::Logger, web};
use log::info;
use std::sync::Arc;

pub async fn startup(config: GateConfig, store: CredentialStore) -> anyhow::Result<()> {
    let proxy = web::Data::new(UpstreamProxy::new(&config)?);
    let gate = AuthGate::new(
        Arc::new(store),
        BypassSet::new(config.bypass_paths.iter().cloned()),
    );
    let payload_limit = config.max_payload_size;

    info!(
        "Starting auth gate at {}:{}, forwarding to {}",
        config.host,
        config.port,
        proxy.base_url()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(proxy.clone())
            .app_data(web::PayloadConfig::new(payload_limit))
            .wrap(gate.clone())
            .wrap(Logger::default())
            .default_service(web::to(forward))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

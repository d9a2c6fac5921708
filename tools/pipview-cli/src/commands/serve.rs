//! Run the session registry until Ctrl-C.

use std::sync::Arc;

use pipview_capture_engine::select_backend;
use pipview_common::config::AppConfig;
use pipview_control_plane::{IngressServer, RegistryConfig, SessionRegistry};
use pipview_platform_core::headless::HeadlessHost;
use pipview_session_model::OpenRequest;

pub async fn run(
    mut config: AppConfig,
    open: Vec<String>,
    ingress: bool,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.ingress.port = port;
    }
    let backend = select_backend(config.capture.backend);
    tracing::info!(backend = backend.name(), "Capture backend selected");

    let channel = SessionRegistry::spawn(
        backend,
        Arc::new(HeadlessHost::new()),
        RegistryConfig::from(&config),
    );

    let mut roster = channel.subscribe_roster();
    let roster_log = tokio::spawn(async move {
        while roster.changed().await.is_ok() {
            let current = roster.borrow_and_update().clone();
            let ids: Vec<String> = current.list.iter().map(|s| s.id.to_string()).collect();
            tracing::info!(count = current.count, sessions = ?ids, "Roster changed");
        }
    });

    for source in open {
        match channel.open(OpenRequest::new(source.clone(), source.clone())).await {
            Ok(session_id) => println!("Opened session {session_id} for {source}"),
            Err(e) => eprintln!("Failed to open {source}: {e}"),
        }
    }

    let server = if ingress && config.ingress.enabled {
        let server = IngressServer::bind(channel.clone(), &config.ingress).await?;
        println!("Remote ingress listening on {}", server.local_addr());
        Some(server)
    } else {
        None
    };

    println!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;
    println!();

    if let Some(server) = server {
        server.shutdown().await;
    }
    channel.close_all().await?;
    roster_log.abort();
    println!("All sessions closed.");
    Ok(())
}

//! Check platform capabilities.

use pipview_capture_engine::select_backend;
use pipview_common::config::AppConfig;
use pipview_platform_core::{detect_display_server, DisplayServer};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("pipview System Check");
    println!("{}", "=".repeat(50));

    match detect_display_server() {
        DisplayServer::Unknown => println!("[WARN] Display server: Unknown"),
        ds => println!("[OK] Display server: {ds:?}"),
    }

    let backend = select_backend(config.capture.backend);
    let caps = backend.capabilities();
    println!("[OK] Capture backend: {}", backend.name());
    if caps.direct_window_capture {
        println!("[OK] Direct window capture available");
    } else {
        println!("[WARN] Direct window capture unavailable, windows are tracked by title");
    }

    println!();
    if config.ingress.enabled {
        println!("Remote ingress: 127.0.0.1:{}", config.ingress.port);
    } else {
        println!("Remote ingress: disabled");
    }
    Ok(())
}

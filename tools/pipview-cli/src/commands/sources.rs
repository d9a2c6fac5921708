//! List capturable sources with the ids `serve --open` accepts.

use pipview_capture_engine::select_backend;
use pipview_common::config::AppConfig;
use pipview_platform_core::virtual_desktop_bounds;
use pipview_session_model::SourceId;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let backend = select_backend(config.capture.backend);

    let monitors = backend.monitors().await?;
    let desktop = virtual_desktop_bounds(&monitors);
    println!(
        "Virtual desktop: {}x{} at ({}, {})",
        desktop.width, desktop.height, desktop.x, desktop.y
    );
    println!();
    println!("Monitors:");
    for (index, m) in monitors.iter().enumerate() {
        println!(
            "  {:<24} {} {}x{} at ({}, {}) {}",
            SourceId::Monitor { index }.to_string(),
            m.name,
            m.width,
            m.height,
            m.x,
            m.y,
            if m.primary { "(primary)" } else { "" }
        );
    }

    let windows = backend.windows().await?;
    println!();
    println!("Windows:");
    for w in &windows {
        let id = match w.handle {
            Some(handle) => SourceId::Window { handle },
            None => SourceId::WindowTitle {
                title: w.title.clone(),
            },
        };
        println!(
            "  {:<24} '{}' {}x{} at ({}, {}){}",
            id.to_string(),
            w.title,
            w.bounds.width,
            w.bounds.height,
            w.bounds.x,
            w.bounds.y,
            if w.minimized { " (minimized)" } else { "" }
        );
    }
    Ok(())
}

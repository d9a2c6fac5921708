//! Send one remote ingress request.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use pipview_common::config::AppConfig;
use pipview_control_plane::send_request;
use pipview_session_model::{IngressRequest, IngressStatus, WindowData, CREATE_WINDOW_PIP};

pub async fn run(
    config: &AppConfig,
    title: String,
    bbox: [i64; 4],
    hwnd: Option<u64>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port.unwrap_or(config.ingress.port)));
    let request = IngressRequest {
        action: CREATE_WINDOW_PIP.to_string(),
        window_data: Some(WindowData { title, bbox, hwnd }),
    };
    let timeout = Duration::from_millis(config.ingress.read_timeout_ms.max(1000) * 2);

    let response = send_request(addr, &request, timeout)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to reach {addr}: {e}"))?;
    println!("{}", serde_json::to_string(&response)?);

    match response.status {
        IngressStatus::Success => Ok(()),
        IngressStatus::Error => anyhow::bail!("request rejected: {}", response.message),
    }
}

/// Parse `x,y,w,h`.
pub fn parse_bbox(s: &str) -> Result<[i64; 4], String> {
    let parts: Vec<i64> = s
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid bbox '{s}': {e}"))?;
    <[i64; 4]>::try_from(parts).map_err(|_| format!("bbox needs 4 values, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(parse_bbox("10, 20,800,600").unwrap(), [10, 20, 800, 600]);
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }
}

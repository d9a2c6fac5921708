//! Remote Ingress: a loopback TCP listener for one-shot JSON requests.
//!
//! Each connection carries exactly one request object and gets exactly
//! one response object before the connection is closed. Bad input always
//! becomes an error response; nothing here can take the process down or
//! hold up a render loop.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use pipview_common::config::IngressConfig;
use pipview_common::error::{PipError, PipResult};
use pipview_session_model::{IngressRequest, IngressResponse, IngressStatus, CREATE_WINDOW_PIP};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::channel::ControlChannel;

const READ_CHUNK: usize = 512;
/// Most unread bytes swallowed after a rejected request.
const DISCARD_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_request_bytes: usize,
    read_timeout: Duration,
}

/// A running listener.
pub struct IngressServer {
    local_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl IngressServer {
    /// Bind `127.0.0.1:<port>` and start accepting. Port `0` picks a free
    /// port; see [`local_addr`](Self::local_addr).
    pub async fn bind(channel: ControlChannel, config: &IngressConfig) -> PipResult<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let limits = Limits {
            max_request_bytes: config.max_request_bytes.max(1),
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(1)),
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, channel, limits, stop_rx));
        tracing::info!(addr = %local_addr, "Remote ingress listening");

        Ok(Self {
            local_addr,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting. Connections already being served finish on their own.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!(addr = %self.local_addr, "Remote ingress stopped");
    }
}

impl Drop for IngressServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    channel: ControlChannel,
    limits: Limits,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let channel = channel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &channel, limits).await {
                            tracing::debug!(%peer, error = %e, "Ingress connection failed");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ingress accept failed");
                }
            },
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    channel: &ControlChannel,
    limits: Limits,
) -> PipResult<()> {
    let response = match read_request(&mut stream, limits).await {
        Ok(body) => handle_request(channel, &body).await,
        Err(e) => IngressResponse::error(e.detail()),
    };
    if response.status == IngressStatus::Error {
        tracing::debug!(message = %response.message, "Ingress request rejected");
    }
    let bytes = serde_json::to_vec(&response)?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    discard_unread(&mut stream, limits.read_timeout).await;
    Ok(())
}

/// Consume whatever the peer still sends so closing does not reset the
/// connection before it has read the response.
async fn discard_unread(stream: &mut TcpStream, timeout: Duration) {
    let mut scratch = [0u8; READ_CHUNK];
    let drain = async {
        let mut total = 0usize;
        while let Ok(n) = stream.read(&mut scratch).await {
            total += n;
            if n == 0 || total > DISCARD_LIMIT {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(timeout, drain).await;
}

/// Read until one complete JSON value, EOF, the byte ceiling, or the
/// read timeout.
async fn read_request(stream: &mut TcpStream, limits: Limits) -> PipResult<Vec<u8>> {
    match tokio::time::timeout(limits.read_timeout, read_body(stream, limits.max_request_bytes))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(PipError::invalid_request("timed out waiting for request")),
    }
}

async fn read_body(stream: &mut TcpStream, max_bytes: usize) -> PipResult<Vec<u8>> {
    let mut body = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&chunk[..n]);
        if body.len() > max_bytes {
            return Err(PipError::invalid_request(format!(
                "request exceeds {max_bytes} bytes"
            )));
        }
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(_) => return Ok(body),
            Err(e) if e.is_eof() => continue,
            // Malformed; the request parser reports it.
            Err(_) => return Ok(body),
        }
    }
}

/// Perform the one action a request names.
pub async fn handle_request(channel: &ControlChannel, body: &[u8]) -> IngressResponse {
    if body.iter().all(u8::is_ascii_whitespace) {
        return IngressResponse::error("empty request");
    }
    let request: IngressRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => return IngressResponse::error(format!("Invalid JSON: {e}")),
    };
    if request.action != CREATE_WINDOW_PIP {
        return IngressResponse::error(format!("Unknown action: {}", request.action));
    }
    let Some(window) = request.window_data else {
        return IngressResponse::error("window_data is required");
    };

    let open = match window.to_open_request() {
        Ok(open) => open,
        Err(e) => return IngressResponse::error(e.detail()),
    };
    match channel.open(open).await {
        Ok(session_id) => {
            tracing::info!(%session_id, title = %window.title, "PiP created from remote ingress");
            IngressResponse::success(format!(
                "PiP window created for '{}' (session {session_id})",
                window.title
            ))
        }
        Err(e) => IngressResponse::error(e.to_string()),
    }
}

/// Client side: send one request to a listener and read its response.
pub async fn send_request(
    addr: SocketAddr,
    request: &IngressRequest,
    timeout: Duration,
) -> PipResult<IngressResponse> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        let body = serde_json::to_vec(request)?;
        stream.write_all(&body).await?;
        stream.shutdown().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        Ok::<_, PipError>(serde_json::from_slice(&reply)?)
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| PipError::channel_closed(format!("no response from {addr}")))?
}

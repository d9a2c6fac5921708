//! Remote Ingress wire format: one JSON object in, one JSON object out.

use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::Rect;
use serde::{Deserialize, Serialize};

use crate::message::{OpenRequest, WindowDescriptor};
use crate::session::SourceId;

/// The only action the listener understands.
pub const CREATE_WINDOW_PIP: &str = "create_window_pip";

/// Incoming request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_data: Option<WindowData>,
}

/// Window description carried by `create_window_pip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowData {
    pub title: String,
    /// `[x, y, w, h]` in desktop pixels.
    pub bbox: [i64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hwnd: Option<u64>,
}

impl WindowData {
    /// Check the bounding box and convert to a descriptor.
    pub fn descriptor(&self) -> PipResult<WindowDescriptor> {
        let [x, y, w, h] = self.bbox;
        let in_range = |v: i64| i32::try_from(v).is_ok();
        if !in_range(x) || !in_range(y) || w <= 0 || h <= 0 || !in_range(w) || !in_range(h) {
            return Err(PipError::invalid_request(format!(
                "invalid bbox {:?}",
                self.bbox
            )));
        }
        Ok(WindowDescriptor {
            title: self.title.clone(),
            bbox: Rect::new(x as i32, y as i32, w as u32, h as u32),
            handle: self.hwnd,
        })
    }

    /// The registry `open` call this window maps to.
    pub fn to_open_request(&self) -> PipResult<OpenRequest> {
        let descriptor = self.descriptor()?;
        let source_id = match self.hwnd {
            Some(handle) => SourceId::Window { handle },
            None if !self.title.is_empty() => SourceId::WindowTitle {
                title: self.title.clone(),
            },
            None => return Err(PipError::invalid_request("window_data needs a title or hwnd")),
        };
        Ok(OpenRequest {
            source_id: Some(source_id.to_string()),
            source_name: Some(self.title.clone()),
            crop: None,
            view: None,
            window: Some(descriptor),
        })
    }
}

/// Outcome reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressStatus {
    Success,
    Error,
}

/// Response written before the connection closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressResponse {
    pub status: IngressStatus,
    pub message: String,
}

impl IngressResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: IngressStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: IngressStatus::Error,
            message: if message.is_empty() {
                "request failed".to_string()
            } else {
                message
            },
        }
    }
}

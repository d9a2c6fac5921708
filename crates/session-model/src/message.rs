//! Control Channel message schema.
//!
//! Requests are at-most-once and always answered with a
//! [`ControlResponse`]; pushes are best-effort and latest-wins.

use pipview_common::error::{ErrorKind, PipError, PipResult};
use pipview_platform_core::Rect;
use serde::{Deserialize, Serialize};

use crate::session::{SessionId, SessionInfo, SourceId};
use crate::viewport::{CropRect, ViewState};

/// Window details supplied by a caller that already enumerated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDescriptor {
    pub title: String,
    pub bbox: Rect,
    pub handle: Option<u64>,
}

/// Payload of `open` (and of the `init` push).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    /// Required; kept optional so a missing id is an `InvalidRequest`
    /// rather than a decode failure.
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub crop: Option<CropRect>,
    pub view: Option<ViewState>,
    /// Extra details for window sources.
    pub window: Option<WindowDescriptor>,
}

/// An `open` request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOpen {
    pub source_id: SourceId,
    pub source_name: String,
    pub crop: Option<CropRect>,
    pub view: ViewState,
    pub window: Option<WindowDescriptor>,
}

impl OpenRequest {
    pub fn new(source_id: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            source_name: Some(source_name.into()),
            ..Self::default()
        }
    }

    /// Parse the source id and check crop/view constraints that do not
    /// depend on the source size.
    pub fn validate(self) -> PipResult<ValidOpen> {
        let raw = self
            .source_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PipError::invalid_request("sourceId is required"))?;
        let source_id: SourceId = raw.parse()?;

        if let Some(crop) = self.crop {
            if crop.w == 0 || crop.h == 0 {
                return Err(PipError::invalid_request("crop must be at least 1x1"));
            }
        }
        let view = self.view.unwrap_or_default();
        view.validate()?;

        let source_name = self
            .source_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| source_id.to_string());

        Ok(ValidOpen {
            source_id,
            source_name,
            crop: self.crop,
            view,
            window: self.window,
        })
    }
}

/// Request half of the Control Channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlRequest {
    Open(OpenRequest),
    Close { session_id: SessionId },
    CloseAll,
    List,
    SetOpacity { session_id: SessionId, value: f64 },
    SetAlwaysOnTop { session_id: SessionId, value: bool },
    /// `ratio = 0` clears the constraint.
    SetAspectRatio { session_id: SessionId, ratio: f64 },
    IsCursorInside { session_id: SessionId },
}

impl ControlRequest {
    /// Session a surface-scoped request targets.
    pub fn target_session(&self) -> Option<SessionId> {
        match self {
            Self::SetOpacity { session_id, .. }
            | Self::SetAlwaysOnTop { session_id, .. }
            | Self::SetAspectRatio { session_id, .. }
            | Self::IsCursorInside { session_id } => Some(*session_id),
            _ => None,
        }
    }
}

/// Response half of the Control Channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlResponse {
    Ok,
    Opened { session_id: SessionId },
    Sessions { list: Vec<SessionInfo> },
    CursorInside { inside: bool },
    Error { kind: ErrorKind, message: String },
}

impl ControlResponse {
    pub fn from_error(err: &PipError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.detail(),
        }
    }

    /// Turn an error response back into a `PipError`.
    pub fn into_result(self) -> PipResult<Self> {
        match self {
            Self::Error { kind, message } => Err(PipError::from_kind(kind, message)),
            other => Ok(other),
        }
    }
}

impl From<PipResult<ControlResponse>> for ControlResponse {
    fn from(result: PipResult<ControlResponse>) -> Self {
        result.unwrap_or_else(|e| Self::from_error(&e))
    }
}

/// Push half of the Control Channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlPush {
    /// Sent once when a surface's host window becomes ready.
    Init {
        session_id: SessionId,
        source_id: SourceId,
        source_name: String,
        crop: Option<CropRect>,
        view: ViewState,
    },
    PipsCount { count: usize },
    PipsList { list: Vec<SessionInfo> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_without_source_is_invalid() {
        let err = OpenRequest::default().validate().unwrap_err();
        assert!(matches!(err, PipError::InvalidRequest { .. }));

        let blank = OpenRequest {
            source_id: Some("  ".to_string()),
            ..OpenRequest::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_open_defaults_name_and_view() {
        let valid = OpenRequest {
            source_id: Some("monitor:1".to_string()),
            ..OpenRequest::default()
        }
        .validate()
        .unwrap();
        assert_eq!(valid.source_name, "monitor:1");
        assert_eq!(valid.view, ViewState::IDENTITY);
    }

    #[test]
    fn test_open_rejects_non_positive_zoom() {
        let req = OpenRequest {
            view: Some(ViewState {
                zoom: -2.0,
                ..ViewState::IDENTITY
            }),
            ..OpenRequest::new("monitor:0", "Monitor 1")
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{"type":"open","sourceId":"monitor:0","sourceName":"Monitor 1"}"#;
        let req: ControlRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            ControlRequest::Open(OpenRequest::new("monitor:0", "Monitor 1"))
        );

        let json = r#"{"type":"setAspectRatio","sessionId":3,"ratio":0}"#;
        let req: ControlRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.target_session(), Some(SessionId(3)));

        let close_all: ControlRequest = serde_json::from_str(r#"{"type":"closeAll"}"#).unwrap();
        assert_eq!(close_all, ControlRequest::CloseAll);
    }

    #[test]
    fn test_error_response_round_trip() {
        let resp = ControlResponse::from_error(&PipError::not_found("session 9"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "not_found");

        let err = resp.into_result().unwrap_err();
        assert!(matches!(err, PipError::NotFound { .. }));
    }

    #[test]
    fn test_push_names() {
        let json = serde_json::to_value(ControlPush::PipsCount { count: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pipsCount", "count": 2}));
    }
}

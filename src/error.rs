// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error taxonomy for the signaling hub (§7). The hub is the only
/// component that translates these into client-visible frames; everything
/// below it returns structured results instead of speaking the wire
/// protocol directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubError {
    /// Malformed frame, missing fields, non-opus SDP. Session stays open.
    BadClient,
    /// Token rejected at `join`. Session is closed.
    AuthFail,
    /// Message refers to a meeting the sender is not a member of.
    NotInMeeting,
    /// Engine call failed but the session is still viable; recovered from
    /// locally and not surfaced to the client.
    EngineTransient,
    /// Engine reports the transport is gone; session is torn down.
    EngineFatal,
    /// Per-session send channel exceeded its drop threshold.
    Overload,
}

impl HubError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadClient => 400,
            Self::AuthFail => 401,
            Self::NotInMeeting => 404,
            // Neither surfaces as an HTTP response in practice (both are
            // recovered from or escalated to a wire `error` frame instead),
            // but a status is still defined for completeness/logging.
            Self::EngineTransient => 200,
            Self::EngineFatal => 409,
            Self::Overload => 503,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadClient => "BAD_CLIENT",
            Self::AuthFail => "AUTH_FAIL",
            Self::NotInMeeting => "NOT_IN_MEETING",
            Self::EngineTransient => "ENGINE_TRANSIENT",
            Self::EngineFatal => "ENGINE_FATAL",
            Self::Overload => "OVERLOAD",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope, used for the small amount of plain
/// HTTP surface (`/healthz` failures, upgrade rejection before the socket
/// is established).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

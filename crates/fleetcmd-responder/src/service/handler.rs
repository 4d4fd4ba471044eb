//! Command acknowledgement.
//!
//! [`handle`] is the whole protocol: parse the body as a [`CommandEnvelope`],
//! optionally compare it with the path, and stamp an [`AckEnvelope`] with the
//! receipt time. [`router`] wires it to `POST /{version}/{identity}/{command}`.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use fleetcmd_core::{
    AckEnvelope, CommandEnvelope, Timestamp, TimestampMode,
    telemetry::{increment_acks_sent, increment_bad_requests},
};
use tower_http::trace::TraceLayer;

/// Per-process responder behavior, shared read-only by every request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResponderOptions {
    /// Reject bodies whose version, VIN or command differ from the path.
    pub strict_path: bool,

    /// Encoding of the receipt timestamp.
    pub timestamp_mode: TimestampMode,
}

/// Path segments of an inbound command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRoute {
    pub version: String,
    pub identity: String,
    pub command: String,
}

impl CommandRoute {
    fn check(&self, envelope: &CommandEnvelope) -> Result<(), Rejection> {
        let pairs = [
            ("version", &self.version, &envelope.protocol_version),
            ("VIN", &self.identity, &envelope.identity),
            ("command", &self.command, &envelope.command),
        ];

        for (field, in_path, in_body) in pairs {
            if in_path != in_body {
                return Err(Rejection::PathMismatch {
                    field,
                    in_path: in_path.clone(),
                    in_body: in_body.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Why a command was answered with `400 Bad Request`.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    /// The body is not a command envelope.
    #[error("Invalid JSON body")]
    InvalidBody(#[source] serde_json::Error),

    /// Strict mode only: a path segment disagrees with the body.
    #[error("Path {field} `{in_path}` does not match body `{in_body}`")]
    PathMismatch {
        field: &'static str,
        in_path: String,
        in_body: String,
    },
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Validates one command and acknowledges it.
///
/// Unless `options.strict_path` is set, the path segments are logged but not
/// compared with the body.
pub fn handle(
    route: &CommandRoute,
    body: &[u8],
    options: ResponderOptions,
) -> Result<AckEnvelope, Rejection> {
    let received_at = Timestamp::now(options.timestamp_mode);
    let envelope: CommandEnvelope = serde_json::from_slice(body).map_err(Rejection::InvalidBody)?;

    tracing::info!(
        version = %route.version,
        vin = %route.identity,
        command = %route.command,
        captured_at = %envelope.captured_at(),
        "Received command"
    );
    tracing::debug!(?envelope, "Received body");

    if options.strict_path {
        route.check(&envelope)?;
    }

    Ok(AckEnvelope::ok(received_at))
}

async fn accept_command(
    State(options): State<ResponderOptions>,
    Path((version, identity, command)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<AckEnvelope>, Rejection> {
    let route = CommandRoute {
        version,
        identity,
        command,
    };

    match handle(&route, &body, options) {
        Ok(ack) => {
            increment_acks_sent();
            Ok(Json(ack))
        }
        Err(rejection) => {
            increment_bad_requests();
            tracing::warn!(vin = %route.identity, error = ?rejection, "Rejected command");
            Err(rejection)
        }
    }
}

/// Builds the responder's router.
pub fn router(options: ResponderOptions) -> Router {
    Router::new()
        .route("/{version}/{identity}/{command}", post(accept_command))
        .layer(TraceLayer::new_for_http())
        .with_state(options)
}

//! HTTP surface of the responder.
//!
//! ## Structure
//!
//! - [`handler`] - request validation, acknowledgement and the axum router.
//! - [`serve`] - runs the router on a bound listener until cancelled.

pub mod handler;

use handler::{ResponderOptions, router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serves the responder on `listener` until `shutdown` is cancelled.
///
/// Each inbound connection and request is handled on its own task; nothing is
/// shared between requests beyond the read-only `options`.
pub async fn serve(
    listener: TcpListener,
    options: ResponderOptions,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(options))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

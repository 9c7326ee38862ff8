//! HTTP bridge for `skein` (axum + SSE).
//!
//! Exposes the executor-facing surface described in spec §6.2: agent
//! listing/definition/UI lookup, `execute`/`execute/stream`/`execute/upload`/
//! `chat`, session management, and `reload`/`stats`/`health`.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod handlers;
mod response;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use app::AppState;
pub use response::ExecuteResponse;

use skein::config::RuntimeConfig;

/// Runs the server on an already-bound listener. Used by tests, which bind
/// to `127.0.0.1:0` to pick a free port and pass the listener in so the
/// chosen port can be read back before any request is sent.
pub async fn run_serve_on_listener(
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    skein_config::load_and_apply("skein", None::<&std::path::Path>).ok();

    let addr = listener.local_addr()?;
    info!("skein-serve listening on http://{}", addr);

    let state = Arc::new(app::build_state(RuntimeConfig::from_env()));
    axum::serve(listener, app::router(state)).await?;
    Ok(())
}

/// Runs the server. Listens on `addr` if given, otherwise on
/// `RUNTIME_HOST:RUNTIME_PORT` (spec §6.4).
pub async fn run_serve(addr: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    skein_config::load_and_apply("skein", None::<&std::path::Path>).ok();

    let config = RuntimeConfig::from_env();
    let bind_addr = match addr {
        Some(addr) => addr.to_string(),
        None => format!("{}:{}", config.host, config.port),
    };
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("skein-serve listening on http://{}", listener.local_addr()?);
    let state = Arc::new(app::build_state(config));
    axum::serve(listener, app::router(state)).await?;
    Ok(())
}

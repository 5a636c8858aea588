/// Control Plane: the HTTP service workers and the Driver poll against
/// during staging, running, and teardown of a single test.
pub mod naming;
pub mod server;
pub mod state;

pub use server::{build_router, ServerState};
pub use state::ControlState;

use std::net::SocketAddr;

use crate::error::CpResult;

/// Bind and serve the control plane until the process is interrupted. The
/// Driver runs this on the master instance; tests exercise `build_router`
/// directly via `tower::ServiceExt::oneshot` instead of binding a socket.
pub async fn serve(addr: SocketAddr, state: ServerState) -> CpResult<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("control plane listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

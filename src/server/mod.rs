//! Web server for submitting and browsing archives.
//!
//! Provides a JSON surface over the services:
//! - Archive submission (one-off or scheduled)
//! - Per-owner listing, download, preview and deletion
//! - Schedule management
//!
//! Callers are identified by the `X-Owner-Id` header; authentication happens
//! in front of this server.

mod error;
mod handlers;
mod owner;
mod routes;

pub use error::ApiError;
pub use owner::{OwnerId, OWNER_HEADER};
pub use routes::create_router;

use std::net::SocketAddr;

use crate::services::{start_scheduler, Services};

/// Shared state for the web server.
pub type AppState = Services;

/// Start the scheduler and the web server.
pub async fn serve(services: Services, host: &str, port: u16) -> anyhow::Result<()> {
    let tick = services.settings.schedule_tick.clone();
    let mut scheduler = start_scheduler(services.trigger.clone(), &tick).await?;

    let app = create_router(services);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    scheduler.shutdown().await?;
    Ok(())
}

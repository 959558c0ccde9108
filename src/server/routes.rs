//! Route definitions for the web server.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Archives
        .route(
            "/archives",
            get(handlers::list_archives).post(handlers::submit_archive),
        )
        .route(
            "/archives/:id",
            get(handlers::download_archive).delete(handlers::delete_archive),
        )
        .route("/archives/:id/preview", get(handlers::preview_index))
        .route("/archives/:id/preview/", get(handlers::preview_index))
        .route("/archives/:id/preview/*path", get(handlers::preview_file))
        // Schedules
        .route("/schedules", get(handlers::list_schedules))
        .route(
            "/schedules/:id",
            get(handlers::get_schedule)
                .put(handlers::update_schedule)
                .delete(handlers::delete_schedule),
        )
        .route("/schedules/:id/pause", post(handlers::pause_schedule))
        .route("/schedules/:id/resume", post(handlers::resume_schedule))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

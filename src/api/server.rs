//! HTTP server implementation for the REST API.
//!
//! Builds the axum router and runs it until the shutdown future resolves.

use axum::{
    Router,
    routing::{delete, get},
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::db::{DependencyGraph, TaskStore};

/// API state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    store: Arc<dyn TaskStore>,
    graph: DependencyGraph,
}

impl ApiServer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        let graph = DependencyGraph::new(Arc::clone(&store));
        Self { store, graph }
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        // Projects
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/projects/{project_id}",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route(
            "/api/projects/{project_id}/boards",
            get(handlers::list_boards).post(handlers::create_board),
        )
        .route(
            "/api/projects/{project_id}/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/projects/{project_id}/dependencies",
            get(handlers::list_project_dependencies),
        )
        .route(
            "/api/projects/{project_id}/blocked",
            get(handlers::list_blocked_tasks),
        )
        // Boards
        .route(
            "/api/boards/{board_id}/columns",
            get(handlers::list_columns).post(handlers::create_column),
        )
        // Tasks
        .route(
            "/api/tasks/{task_id}",
            get(handlers::get_task)
                .patch(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route(
            "/api/tasks/{task_id}/dependencies",
            get(handlers::get_dependencies).post(handlers::add_dependency),
        )
        .route(
            "/api/tasks/{task_id}/dependencies/{depends_on_task_id}",
            delete(handlers::remove_dependency),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `host:port` until `shutdown` resolves.
///
/// Returns once in-flight requests have drained.
pub async fn serve<F>(
    store: Arc<dyn TaskStore>,
    host: &str,
    port: u16,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ApiServer::new(store));

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("API server shutting down");
        })
        .await?;

    Ok(())
}

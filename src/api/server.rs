use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::aggregator::InstanceRegistry;
use crate::api::handlers;
use crate::engine::HealthService;

pub fn create_instance_router(service: Arc<HealthService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/:group", get(handlers::group_health))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

pub fn create_aggregator_router(registry: Arc<InstanceRegistry>) -> Router {
    Router::new()
        .route("/health", get(handlers::aggregator_health))
        .route("/register", post(handlers::register))
        .route("/instances", get(handlers::list_instances))
        .route(
            "/instances/:id",
            get(handlers::get_instance).delete(handlers::deregister_instance),
        )
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

pub async fn serve<F>(app: Router, bind: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;

    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod entities;
mod error;
mod handler;
mod openapi;
mod repo;
mod schema;
mod service;
mod state;

use crate::{openapi::ApiDoc, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = AppState::new().await?;
    let report = state.seed().await?;
    tracing::info!(
        roles = ?report.roles,
        dev_admin_created = report.dev_admin_created,
        "seed complete"
    );

    let app = Router::new()
        .merge(handler::health::routes())
        .merge(handler::auth::password::routes(state.clone()))
        .merge(handler::auth::keycloak::routes(state.clone()))
        .merge(handler::session::routes(state.clone()))
        .merge(handler::dashboard::routes(state.clone()))
        .merge(handler::users::routes(state.clone()))
        .merge(handler::dev::routes(state.clone()))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("0.0.0.0:{}", state.config().port());
    tracing::info!("account-admin listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

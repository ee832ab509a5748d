//! Market HTTP API.
//!
//! Read/create surface for the frontend; resolution itself only ever happens
//! through the worker or the CLI, never over HTTP.

use crate::models::{Market, MetricType};
use crate::pipeline::field;
use crate::store::MarketStore;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
struct ApiState {
    store: Arc<MarketStore>,
}

pub fn router(store: Arc<MarketStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/markets", get(list_markets).post(create_market))
        .route("/markets/pending", get(list_pending))
        .route("/markets/:id", get(get_market))
        .layer(CorsLayer::permissive())
        .with_state(ApiState { store })
}

pub async fn serve(store: Arc<MarketStore>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Market API listening on {addr}");
    axum::serve(listener, router(store)).await?;
    Ok(())
}

fn internal_error(e: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}

async fn list_markets(State(state): State<ApiState>) -> Response {
    match state.store.list_all() {
        Ok(markets) => Json(markets).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn list_pending(State(state): State<ApiState>) -> Response {
    match state.store.list_pending() {
        Ok(markets) => Json(markets).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_market(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.get(&id) {
        Ok(Some(market)) => Json(market).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Market not found" })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct CreateMarketRequest {
    title: String,
    #[serde(default)]
    description: String,
    deadline: i64,
    threshold: f64,
    #[serde(default)]
    metric_type: Option<String>,
}

async fn create_market(
    State(state): State<ApiState>,
    Json(req): Json<CreateMarketRequest>,
) -> Response {
    if req.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required field: title" })),
        )
            .into_response();
    }

    let metric_type = match req.metric_type.as_deref() {
        None | Some("") => MetricType::EthStakingRate,
        Some(tag) => match MetricType::parse(tag) {
            Some(metric_type) => metric_type,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("Unknown metric type: {tag}") })),
                )
                    .into_response();
            }
        },
    };

    // Titles that are already field literals are used as the pool key
    // directly; anything else is packed into one.
    let market_id = if field::is_field_literal(&req.title) {
        req.title.clone()
    } else {
        field::string_to_field(&req.title)
    };

    let market = Market::new(market_id, req.deadline, req.threshold, metric_type)
        .with_title(req.title)
        .with_description(req.description);

    match state.store.add_market(&market) {
        Ok(()) => (StatusCode::CREATED, Json(market)).into_response(),
        Err(e) => internal_error(e),
    }
}

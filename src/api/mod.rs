pub mod accounts;
pub mod health;
pub mod orders;
pub mod overview;
pub mod settlement;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::{OrderService, SettlementService};
use crate::stats::Aggregator;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub orders: Arc<OrderService>,
    pub settlement: Arc<SettlementService>,
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let orders = Arc::new(OrderService::new(repo.clone()));
        let settlement = Arc::new(SettlementService::new(repo.clone(), config.clone()));
        let aggregator = Arc::new(Aggregator::new(repo.clone(), config.clone()));
        Self {
            repo,
            config,
            orders,
            settlement,
            aggregator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/orders", post(orders::create_order))
        .route("/v1/orders/expiry-sweep", post(orders::expiry_sweep))
        .route("/v1/orders/:id", get(orders::get_order))
        .route("/v1/orders/:id/transition", post(orders::transition_order))
        .route("/v1/settlement/:sales_code", get(settlement::get_settlement))
        .route(
            "/v1/settlement/:sales_code/export",
            get(settlement::export_settlement),
        )
        .route("/v1/overview", get(overview::get_overview))
        .route(
            "/v1/accounts/:sales_code/stats",
            get(overview::get_account_stats),
        )
        .route("/v1/accounts", post(accounts::register_account))
        .route("/v1/accounts/:sales_code/rate", put(accounts::set_rate))
        .route(
            "/v1/accounts/:sales_code/exclusion",
            put(accounts::set_exclusion),
        )
        .layer(cors)
        .with_state(state)
}

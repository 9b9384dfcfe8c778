use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    api::{baseline, optimize, prices, sessions},
    controller::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/optimize", post(optimize::optimize))
        .route("/sweep", post(optimize::sweep))
        .route("/baseline", post(baseline::baseline))
        .route("/sessions/index", post(sessions::index))
        .route("/prices/synthetic", get(prices::synthetic_prices))
}

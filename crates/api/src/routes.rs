use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json,
    Router,
};
use chrono::Utc;
use market_data::{MarketDataError, Mover, PriceHistory, StockOverview};
use serde::Serialize;
use tracing::warn;

use crate::{state::AppState, ws};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stock/:ticker", get(stock_overview))
        .route("/stock/:ticker/price/:range", get(price_history))
        .route("/top_movers", get(top_movers))
        .route("/ws", get(ws::price_socket))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Every provider or input failure surfaces as `400 {"error": ...}`.
#[derive(Debug)]
pub struct ApiError(MarketDataError);

impl From<MarketDataError> for ApiError {
    fn from(err: MarketDataError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "request failed");
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

async fn stock_overview(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockOverview>, ApiError> {
    let overview = market_data::stock_overview(state.fundamentals(), &ticker).await?;
    Ok(Json(overview))
}

async fn top_movers(State(state): State<AppState>) -> Json<Vec<Mover>> {
    Json(market_data::top_movers(state.fundamentals()).await)
}

async fn price_history(
    State(state): State<AppState>,
    Path((ticker, range)): Path<(String, String)>,
) -> Result<Json<PriceHistory>, ApiError> {
    let history =
        market_data::price_history(state.fundamentals(), &ticker, &range, Utc::now()).await?;
    Ok(Json(history))
}

//! Virtual trading: portfolio view, stock browser and trade execution.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use super::{current_user, query_number};
use crate::adapters::web::AppState;
use crate::adapters::web::auth::AuthSession;
use crate::adapters::web::error::WebError;
use crate::domain::error::PaisaError;
use crate::domain::execution::{TradeOrder, TradeReceipt};
use crate::domain::portfolio::{PortfolioSummary, PortfolioView, TransactionType};
use crate::domain::stock::{StockPage, StockQuote};

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    pub search: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TradeForm {
    pub transaction_type: String,
    pub quantity: String,
}

impl TradeForm {
    pub fn into_order(self, stock_id: i64) -> Result<TradeOrder, PaisaError> {
        let transaction_type = TransactionType::from_str(self.transaction_type.trim())?;
        let quantity = self
            .quantity
            .trim()
            .parse::<i64>()
            .map_err(|_| PaisaError::InvalidQuantity)?;
        Ok(TradeOrder {
            transaction_type,
            stock_id,
            quantity,
        })
    }
}

pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<PortfolioView>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.revalue_portfolio(&user)?))
}

pub async fn stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StockQuery>,
) -> Result<Json<StockPage>, WebError> {
    let page = query_number(query.page.as_deref());
    Ok(Json(state.store.list_stocks(query.search.as_deref(), page)?))
}

pub async fn trade(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(stock_id): Path<i64>,
    Form(form): Form<TradeForm>,
) -> Result<Json<TradeReceipt>, WebError> {
    let user = current_user(&auth)?;
    let order = form.into_order(stock_id)?;
    Ok(Json(state.store.execute_trade(&user, &order)?))
}

pub async fn stock_price(
    State(state): State<Arc<AppState>>,
    Path(stock_id): Path<i64>,
) -> Result<Json<StockQuote>, WebError> {
    Ok(Json(state.store.stock_quote(stock_id)?))
}

pub async fn portfolio_summary(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<PortfolioSummary>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.portfolio_summary(&user)?))
}

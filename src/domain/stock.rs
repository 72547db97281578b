//! Stock reference data and price quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::PaisaError;
use super::money::{AMOUNT_DIGITS, check_money};

pub const STOCKS_PER_PAGE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub current_price: Decimal,
    pub previous_close: Decimal,
    pub market_cap: Option<i64>,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
}

/// One row of imported reference data, keyed by symbol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockListing {
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub current_price: Decimal,
    pub previous_close: Decimal,
    #[serde(default)]
    pub market_cap: Option<i64>,
}

impl StockListing {
    pub fn validate(&self) -> Result<(), PaisaError> {
        let symbol = self.symbol.trim();
        if symbol.is_empty() || symbol.len() > 10 {
            return Err(PaisaError::validation(
                "symbol",
                format!("'{}' must be 1 to 10 characters", self.symbol),
            ));
        }
        if self.current_price <= Decimal::ZERO {
            return Err(PaisaError::validation(
                "current_price",
                format!("{} must be positive", self.symbol),
            ));
        }
        if self.previous_close < Decimal::ZERO {
            return Err(PaisaError::validation(
                "previous_close",
                format!("{} cannot be negative", self.symbol),
            ));
        }
        check_money("current_price", self.current_price, AMOUNT_DIGITS)?;
        check_money("previous_close", self.previous_close, AMOUNT_DIGITS)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockQuote {
    pub symbol: String,
    pub current_price: Decimal,
    pub previous_close: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
}

impl From<&Stock> for StockQuote {
    fn from(stock: &Stock) -> Self {
        let change = stock.current_price - stock.previous_close;
        let change_percent = if stock.previous_close.is_zero() {
            Decimal::ZERO
        } else {
            (change / stock.previous_close * Decimal::ONE_HUNDRED).round_dp(2)
        };
        StockQuote {
            symbol: stock.symbol.clone(),
            current_price: stock.current_price,
            previous_close: stock.previous_close,
            change,
            change_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockPage {
    pub stocks: Vec<Stock>,
    pub page: usize,
    pub num_pages: usize,
    pub total: usize,
    pub search_query: String,
}

/// Clamp a 1-based page request into `1..=num_pages`; an empty result set
/// still has one (empty) page.
pub fn clamp_page(requested: Option<usize>, total: usize, per_page: usize) -> (usize, usize) {
    let num_pages = total.div_ceil(per_page).max(1);
    let page = requested.unwrap_or(1).clamp(1, num_pages);
    (page, num_pages)
}

/// Case-insensitive substring match against symbol or company name.
pub fn matches_search(stock: &Stock, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    stock.symbol.to_lowercase().contains(&query)
        || stock.company_name.to_lowercase().contains(&query)
}

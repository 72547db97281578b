//! Virtual trading ledger and stock reference data.

use crate::domain::error::PaisaError;
use crate::domain::execution::{TradeOrder, TradeReceipt};
use crate::domain::portfolio::{PortfolioSummary, PortfolioView};
use crate::domain::stock::{StockListing, StockPage, StockQuote};
use crate::domain::user::UserContext;

pub trait LedgerPort {
    /// Validate and apply one order atomically. Nothing is written when the
    /// order is rejected.
    fn execute_trade(&self, user: &UserContext, order: &TradeOrder)
    -> Result<TradeReceipt, PaisaError>;

    /// Mark every holding to the current stock price and persist the totals.
    fn revalue_portfolio(&self, user: &UserContext) -> Result<PortfolioView, PaisaError>;

    fn portfolio_summary(&self, user: &UserContext) -> Result<PortfolioSummary, PaisaError>;

    fn list_stocks(&self, search: Option<&str>, page: Option<usize>)
    -> Result<StockPage, PaisaError>;

    fn stock_quote(&self, stock_id: i64) -> Result<StockQuote, PaisaError>;

    /// Insert or update stocks keyed by symbol. Returns the number written.
    fn upsert_stocks(&self, stocks: &[StockListing]) -> Result<usize, PaisaError>;
}

//! Virtual portfolio state, holdings and the trade log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::PaisaError;
use super::money;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualPortfolio {
    pub id: i64,
    pub user_id: i64,
    pub virtual_cash: Decimal,
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub id: i64,
    pub portfolio_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub quantity: i64,
    pub average_price: Decimal,
    pub invested_amount: Decimal,
    pub current_value: Decimal,
}

impl Holding {
    pub fn market_value(&self, price: Decimal) -> Result<Decimal, PaisaError> {
        money::mul(Decimal::from(self.quantity), price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(PaisaError::validation(
                "transaction_type",
                format!("expected buy or sell, got '{other}'"),
            )),
        }
    }
}

/// Append-only record of one fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualTransaction {
    pub id: Uuid,
    pub portfolio_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub virtual_cash: Decimal,
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
}

impl From<&VirtualPortfolio> for PortfolioSummary {
    fn from(p: &VirtualPortfolio) -> Self {
        let profit_loss_percent = if p.total_invested > Decimal::ZERO {
            (p.profit_loss / p.total_invested * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        PortfolioSummary {
            virtual_cash: p.virtual_cash,
            total_invested: p.total_invested,
            current_value: p.current_value,
            profit_loss: p.profit_loss,
            profit_loss_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioView {
    pub portfolio: VirtualPortfolio,
    pub summary: PortfolioSummary,
    pub holdings: Vec<Holding>,
    pub recent_transactions: Vec<VirtualTransaction>,
}

/// Mark holdings to the given prices and roll the totals into the portfolio.
/// Holdings without a price keep their previous current value.
pub fn revalue<F>(
    portfolio: &mut VirtualPortfolio,
    holdings: &mut [Holding],
    price_of: F,
) -> Result<(), PaisaError>
where
    F: Fn(i64) -> Option<Decimal>,
{
    for holding in holdings.iter_mut() {
        if let Some(price) = price_of(holding.stock_id) {
            holding.current_value = holding.market_value(price)?;
        }
    }
    let total = money::sum(holdings.iter().map(|h| h.current_value))?;
    portfolio.current_value = total;
    portfolio.profit_loss = money::sub(total, portfolio.total_invested)?;
    Ok(())
}

//! Portfolio, holdings, the trade log and stock reference data.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    SqliteStore, conversion_err, decimal_col, enum_col, money, query_err, timestamp_col, ts,
};
use crate::domain::error::PaisaError;
use crate::domain::execution::{TradeOrder, TradeReceipt, plan_trade, trade_message};
use crate::domain::portfolio::{
    Holding, PortfolioSummary, PortfolioView, VirtualPortfolio, VirtualTransaction, revalue,
};
use crate::domain::stock::{
    STOCKS_PER_PAGE, Stock, StockListing, StockPage, StockQuote, clamp_page, matches_search,
};
use crate::domain::user::UserContext;
use crate::ports::ledger_port::LedgerPort;

const RECENT_TRANSACTIONS: usize = 10;

const HOLDING_COLUMNS: &str = "h.id, h.portfolio_id, h.stock_id, s.symbol, h.quantity,
     h.average_price, h.invested_amount, h.current_value, s.current_price";

const STOCK_COLUMNS: &str = "id, symbol, company_name, sector, current_price, previous_close,
     market_cap, is_active, last_updated";

fn portfolio_from_row(row: &Row<'_>) -> rusqlite::Result<VirtualPortfolio> {
    Ok(VirtualPortfolio {
        id: row.get(0)?,
        user_id: row.get(1)?,
        virtual_cash: decimal_col(row, 2)?,
        total_invested: decimal_col(row, 3)?,
        current_value: decimal_col(row, 4)?,
        profit_loss: decimal_col(row, 5)?,
        created_at: timestamp_col(row, 6)?,
    })
}

fn stock_from_row(row: &Row<'_>) -> rusqlite::Result<Stock> {
    Ok(Stock {
        id: row.get(0)?,
        symbol: row.get(1)?,
        company_name: row.get(2)?,
        sector: row.get(3)?,
        current_price: decimal_col(row, 4)?,
        previous_close: decimal_col(row, 5)?,
        market_cap: row.get(6)?,
        is_active: row.get(7)?,
        last_updated: timestamp_col(row, 8)?,
    })
}

fn holding_from_row(row: &Row<'_>) -> rusqlite::Result<Holding> {
    Ok(Holding {
        id: row.get(0)?,
        portfolio_id: row.get(1)?,
        stock_id: row.get(2)?,
        symbol: row.get(3)?,
        quantity: row.get(4)?,
        average_price: decimal_col(row, 5)?,
        invested_amount: decimal_col(row, 6)?,
        current_value: decimal_col(row, 7)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<VirtualTransaction> {
    let raw_id: String = row.get(0)?;
    Ok(VirtualTransaction {
        id: Uuid::parse_str(&raw_id).map_err(|e| conversion_err(0, e))?,
        portfolio_id: row.get(1)?,
        stock_id: row.get(2)?,
        symbol: row.get(3)?,
        transaction_type: enum_col(row, 4)?,
        quantity: row.get(5)?,
        price_per_share: decimal_col(row, 6)?,
        total_amount: decimal_col(row, 7)?,
        timestamp: timestamp_col(row, 8)?,
    })
}

pub(super) fn load_portfolio(
    conn: &Connection,
    user_id: i64,
) -> Result<VirtualPortfolio, PaisaError> {
    conn.query_row(
        "SELECT id, user_id, virtual_cash, total_invested, current_value, profit_loss, created_at
         FROM portfolios WHERE user_id = ?1",
        params![user_id],
        portfolio_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("portfolio", user_id))
}

fn load_stock(conn: &Connection, stock_id: i64) -> Result<Option<Stock>, PaisaError> {
    conn.query_row(
        &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?1"),
        params![stock_id],
        stock_from_row,
    )
    .optional()
    .map_err(query_err)
}

fn load_active_stock(conn: &Connection, stock_id: i64) -> Result<Stock, PaisaError> {
    load_stock(conn, stock_id)?
        .filter(|s| s.is_active)
        .ok_or_else(|| PaisaError::not_found("stock", stock_id))
}

fn load_holding(
    conn: &Connection,
    portfolio_id: i64,
    stock_id: i64,
) -> Result<Option<Holding>, PaisaError> {
    conn.query_row(
        &format!(
            "SELECT {HOLDING_COLUMNS} FROM holdings h JOIN stocks s ON s.id = h.stock_id
             WHERE h.portfolio_id = ?1 AND h.stock_id = ?2"
        ),
        params![portfolio_id, stock_id],
        holding_from_row,
    )
    .optional()
    .map_err(query_err)
}

/// Holdings with the current price of each stock.
fn load_holdings(
    conn: &Connection,
    portfolio_id: i64,
) -> Result<Vec<(Holding, rust_decimal::Decimal)>, PaisaError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {HOLDING_COLUMNS} FROM holdings h JOIN stocks s ON s.id = h.stock_id
             WHERE h.portfolio_id = ?1 ORDER BY s.symbol"
        ))
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![portfolio_id], |row| {
            Ok((holding_from_row(row)?, decimal_col(row, 8)?))
        })
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

pub(super) fn recent_transactions(
    conn: &Connection,
    portfolio_id: i64,
    limit: usize,
) -> Result<Vec<VirtualTransaction>, PaisaError> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.portfolio_id, t.stock_id, s.symbol, t.transaction_type, t.quantity,
                    t.price_per_share, t.total_amount, t.timestamp
             FROM virtual_transactions t JOIN stocks s ON s.id = t.stock_id
             WHERE t.portfolio_id = ?1
             ORDER BY t.timestamp DESC, t.rowid DESC
             LIMIT ?2",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![portfolio_id, limit as i64], transaction_from_row)
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

impl LedgerPort for SqliteStore {
    fn execute_trade(
        &self,
        user: &UserContext,
        order: &TradeOrder,
    ) -> Result<TradeReceipt, PaisaError> {
        if order.quantity <= 0 {
            return Err(PaisaError::InvalidQuantity);
        }
        let now = Utc::now();

        self.write(|tx| {
            let stock = load_active_stock(tx, order.stock_id)?;
            let portfolio = load_portfolio(tx, user.user_id)?;
            let holding = load_holding(tx, portfolio.id, stock.id)?;
            let plan = plan_trade(
                order.transaction_type,
                order.quantity,
                stock.current_price,
                &portfolio,
                holding.as_ref(),
            )?;

            let transaction = VirtualTransaction {
                id: Uuid::new_v4(),
                portfolio_id: portfolio.id,
                stock_id: stock.id,
                symbol: stock.symbol.clone(),
                transaction_type: plan.transaction_type,
                quantity: plan.quantity,
                price_per_share: plan.price_per_share,
                total_amount: plan.total_amount,
                timestamp: now,
            };
            tx.execute(
                "INSERT INTO virtual_transactions (id, portfolio_id, stock_id, transaction_type,
                     quantity, price_per_share, total_amount, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    transaction.id.to_string(),
                    transaction.portfolio_id,
                    transaction.stock_id,
                    transaction.transaction_type.as_str(),
                    transaction.quantity,
                    money(transaction.price_per_share),
                    money(transaction.total_amount),
                    ts(transaction.timestamp),
                ],
            )
            .map_err(query_err)?;

            tx.execute(
                "UPDATE portfolios SET virtual_cash = ?1, total_invested = ?2 WHERE id = ?3",
                params![
                    money(plan.cash_after),
                    money(plan.total_invested_after),
                    portfolio.id
                ],
            )
            .map_err(query_err)?;

            match plan.holding_after {
                Some(state) => {
                    let market_value = crate::domain::money::mul(
                        rust_decimal::Decimal::from(state.quantity),
                        stock.current_price,
                    )?;
                    tx.execute(
                        "INSERT INTO holdings (portfolio_id, stock_id, quantity, average_price,
                             invested_amount, current_value)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT (portfolio_id, stock_id) DO UPDATE SET
                             quantity = excluded.quantity,
                             average_price = excluded.average_price,
                             invested_amount = excluded.invested_amount,
                             current_value = excluded.current_value",
                        params![
                            portfolio.id,
                            stock.id,
                            state.quantity,
                            money(state.average_price),
                            money(state.invested_amount),
                            money(market_value),
                        ],
                    )
                    .map_err(query_err)?;
                }
                None => {
                    tx.execute(
                        "DELETE FROM holdings WHERE portfolio_id = ?1 AND stock_id = ?2",
                        params![portfolio.id, stock.id],
                    )
                    .map_err(query_err)?;
                }
            }

            Ok(TradeReceipt {
                message: trade_message(plan.transaction_type, plan.quantity, &stock.symbol),
                transaction,
                portfolio: load_portfolio(tx, user.user_id)?,
                holding: load_holding(tx, portfolio.id, stock.id)?,
            })
        })
    }

    fn revalue_portfolio(&self, user: &UserContext) -> Result<PortfolioView, PaisaError> {
        self.write(|tx| {
            let mut portfolio = load_portfolio(tx, user.user_id)?;
            let priced = load_holdings(tx, portfolio.id)?;
            let prices: HashMap<i64, rust_decimal::Decimal> =
                priced.iter().map(|(h, price)| (h.stock_id, *price)).collect();
            let mut holdings: Vec<Holding> = priced.into_iter().map(|(h, _)| h).collect();

            revalue(&mut portfolio, &mut holdings, |stock_id| {
                prices.get(&stock_id).copied()
            })?;

            for holding in &holdings {
                tx.execute(
                    "UPDATE holdings SET current_value = ?1 WHERE id = ?2",
                    params![money(holding.current_value), holding.id],
                )
                .map_err(query_err)?;
            }
            tx.execute(
                "UPDATE portfolios SET current_value = ?1, profit_loss = ?2 WHERE id = ?3",
                params![
                    money(portfolio.current_value),
                    money(portfolio.profit_loss),
                    portfolio.id
                ],
            )
            .map_err(query_err)?;

            let recent = recent_transactions(tx, portfolio.id, RECENT_TRANSACTIONS)?;
            Ok(PortfolioView {
                summary: PortfolioSummary::from(&portfolio),
                portfolio,
                holdings,
                recent_transactions: recent,
            })
        })
    }

    fn portfolio_summary(&self, user: &UserContext) -> Result<PortfolioSummary, PaisaError> {
        let conn = self.conn()?;
        let portfolio = load_portfolio(&conn, user.user_id)?;
        Ok(PortfolioSummary::from(&portfolio))
    }

    fn list_stocks(
        &self,
        search: Option<&str>,
        page: Option<usize>,
    ) -> Result<StockPage, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STOCK_COLUMNS} FROM stocks WHERE is_active = 1 ORDER BY symbol"
            ))
            .map_err(query_err)?;
        let rows = stmt.query_map([], stock_from_row).map_err(query_err)?;
        let query = search.unwrap_or("").trim().to_string();

        let mut matching = Vec::new();
        for row in rows {
            let stock = row.map_err(query_err)?;
            if matches_search(&stock, &query) {
                matching.push(stock);
            }
        }

        let total = matching.len();
        let (page, num_pages) = clamp_page(page, total, STOCKS_PER_PAGE);
        let stocks = matching
            .into_iter()
            .skip((page - 1) * STOCKS_PER_PAGE)
            .take(STOCKS_PER_PAGE)
            .collect();
        Ok(StockPage {
            stocks,
            page,
            num_pages,
            total,
            search_query: query,
        })
    }

    fn stock_quote(&self, stock_id: i64) -> Result<StockQuote, PaisaError> {
        let conn = self.conn()?;
        let stock = load_active_stock(&conn, stock_id)?;
        Ok(StockQuote::from(&stock))
    }

    fn upsert_stocks(&self, stocks: &[StockListing]) -> Result<usize, PaisaError> {
        for listing in stocks {
            listing.validate()?;
        }
        let now = ts(Utc::now());
        self.write(|tx| {
            for listing in stocks {
                tx.execute(
                    "INSERT INTO stocks (symbol, company_name, sector, current_price,
                         previous_close, market_cap, is_active, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
                     ON CONFLICT (symbol) DO UPDATE SET
                         company_name = excluded.company_name,
                         sector = excluded.sector,
                         current_price = excluded.current_price,
                         previous_close = excluded.previous_close,
                         market_cap = excluded.market_cap,
                         is_active = 1,
                         last_updated = excluded.last_updated",
                    params![
                        listing.symbol.trim().to_uppercase(),
                        listing.company_name.trim(),
                        listing.sector.trim(),
                        money(listing.current_price),
                        money(listing.previous_close),
                        listing.market_cap,
                        now,
                    ],
                )
                .map_err(query_err)?;
            }
            Ok(stocks.len())
        })
    }
}

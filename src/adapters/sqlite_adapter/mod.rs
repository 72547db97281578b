//! SQLite store implementing every persistence port.
//!
//! Money is stored as TEXT and summed in Rust. Timestamps are RFC 3339 text
//! with a fixed precision so they sort lexicographically. Each mutating
//! operation runs in a single `BEGIN IMMEDIATE` transaction.

mod budget;
mod content;
mod goals;
mod ledger;
mod progress;
mod tokens;
mod users;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::error::PaisaError;
use crate::domain::settings::{Settings, StoreOptions};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    phone_number TEXT UNIQUE,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    age INTEGER,
    occupation TEXT NOT NULL DEFAULT '',
    monthly_income TEXT NOT NULL DEFAULT '0',
    financial_experience TEXT NOT NULL DEFAULT 'beginner',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_profiles (
    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    total_points INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    streak_days INTEGER NOT NULL DEFAULT 0,
    last_activity TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS portfolios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    virtual_cash TEXT NOT NULL,
    total_invested TEXT NOT NULL DEFAULT '0',
    current_value TEXT NOT NULL DEFAULT '0',
    profit_loss TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    company_name TEXT NOT NULL,
    sector TEXT NOT NULL DEFAULT '',
    current_price TEXT NOT NULL,
    previous_close TEXT NOT NULL,
    market_cap INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_updated TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS holdings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    portfolio_id INTEGER NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
    stock_id INTEGER NOT NULL REFERENCES stocks(id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    average_price TEXT NOT NULL,
    invested_amount TEXT NOT NULL,
    current_value TEXT NOT NULL DEFAULT '0',
    UNIQUE (portfolio_id, stock_id)
);
CREATE TABLE IF NOT EXISTS virtual_transactions (
    id TEXT PRIMARY KEY,
    portfolio_id INTEGER NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
    stock_id INTEGER NOT NULL REFERENCES stocks(id),
    transaction_type TEXT NOT NULL CHECK (transaction_type IN ('buy', 'sell')),
    quantity INTEGER NOT NULL CHECK (quantity >= 1),
    price_per_share TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_portfolio
    ON virtual_transactions(portfolio_id, timestamp);
CREATE TABLE IF NOT EXISTS budgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS budget_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    budget_id INTEGER NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    allocated_amount TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id INTEGER REFERENCES budget_categories(id) ON DELETE SET NULL,
    description TEXT NOT NULL,
    amount TEXT NOT NULL,
    date TEXT NOT NULL,
    is_recurring INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date);
CREATE TABLE IF NOT EXISTS financial_goals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    goal_type TEXT NOT NULL,
    target_amount TEXT NOT NULL,
    saved_amount TEXT NOT NULL DEFAULT '0',
    target_date TEXT NOT NULL,
    is_achieved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS token_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    amount INTEGER NOT NULL,
    balance_after INTEGER NOT NULL CHECK (balance_after >= 0),
    kind TEXT NOT NULL CHECK (kind IN ('earn', 'spend', 'purchase')),
    description TEXT NOT NULL,
    reference TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_token_transactions_user ON token_transactions(user_id);
CREATE TABLE IF NOT EXISTS token_packages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    tokens INTEGER NOT NULL,
    price TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS coupons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    brand TEXT NOT NULL DEFAULT '',
    code_prefix TEXT NOT NULL,
    token_cost INTEGER NOT NULL,
    stock INTEGER NOT NULL,
    used INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
    valid_until TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_coupons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    coupon_id INTEGER NOT NULL REFERENCES coupons(id),
    code TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL CHECK (status IN ('active', 'redeemed')),
    purchased_at TEXT NOT NULL,
    redeemed_at TEXT
);
CREATE TABLE IF NOT EXISTS learning_modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    difficulty_level TEXT NOT NULL DEFAULT 'beginner',
    points_reward INTEGER NOT NULL DEFAULT 10,
    token_reward INTEGER NOT NULL DEFAULT 50,
    estimated_time INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    sort_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS quizzes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL UNIQUE REFERENCES learning_modules(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    passing_score INTEGER NOT NULL DEFAULT 70
);
CREATE TABLE IF NOT EXISTS quiz_questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    question_text TEXT NOT NULL,
    option_a TEXT NOT NULL,
    option_b TEXT NOT NULL,
    option_c TEXT NOT NULL,
    option_d TEXT NOT NULL,
    correct_answer TEXT NOT NULL CHECK (correct_answer IN ('A', 'B', 'C', 'D')),
    explanation TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS user_progress (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    module_id INTEGER NOT NULL REFERENCES learning_modules(id) ON DELETE CASCADE,
    is_completed INTEGER NOT NULL DEFAULT 0,
    completion_date TEXT,
    quiz_score REAL,
    quiz_passed INTEGER NOT NULL DEFAULT 0,
    time_spent INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, module_id)
);
CREATE TABLE IF NOT EXISTS fraud_scenarios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    scenario_content TEXT NOT NULL,
    fraud_type TEXT NOT NULL,
    red_flags TEXT NOT NULL DEFAULT '[]',
    correct_action TEXT NOT NULL,
    points_reward INTEGER NOT NULL DEFAULT 15,
    token_reward INTEGER NOT NULL DEFAULT 20,
    difficulty_level TEXT NOT NULL DEFAULT 'beginner',
    is_active INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS user_fraud_progress (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    scenario_id INTEGER NOT NULL REFERENCES fraud_scenarios(id) ON DELETE CASCADE,
    user_response TEXT NOT NULL,
    is_correct INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0,
    completion_date TEXT,
    PRIMARY KEY (user_id, scenario_id)
);";

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    options: StoreOptions,
}

impl SqliteStore {
    pub fn from_settings(settings: &Settings) -> Result<Self, PaisaError> {
        Self::open(
            &settings.database_path,
            settings.pool_size,
            settings.store_options(),
        )
    }

    pub fn open(path: &str, pool_size: u32, options: StoreOptions) -> Result<Self, PaisaError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            if !mode.eq_ignore_ascii_case("wal") {
                eprintln!("Warning: SQLite kept journal_mode={mode}, WAL unavailable");
            }
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys=ON;")
        });
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool, options })
    }

    pub fn in_memory() -> Result<Self, PaisaError> {
        Self::in_memory_with(StoreOptions::default())
    }

    /// Single-connection pool: every connection to `:memory:` is its own
    /// database.
    pub fn in_memory_with(options: StoreOptions) -> Result<Self, PaisaError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys=ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool, options })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn initialize_schema(&self) -> Result<(), PaisaError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PaisaError> {
        self.pool.get().map_err(pool_err)
    }

    /// Run `f` inside one immediate write transaction, committing only when
    /// it succeeds.
    fn write<T, F>(&self, f: F) -> Result<T, PaisaError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, PaisaError>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;
        let value = f(&tx)?;
        tx.commit().map_err(query_err)?;
        Ok(value)
    }
}

fn pool_err(e: r2d2::Error) -> PaisaError {
    PaisaError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PaisaError {
    PaisaError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Like [`query_err`] but turns a UNIQUE failure into `Duplicate` naming the
/// offending column.
fn write_err(e: rusqlite::Error) -> PaisaError {
    if let rusqlite::Error::SqliteFailure(ref code, Some(ref message)) = e {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            let field = message
                .trim_start_matches("UNIQUE constraint failed: ")
                .split(',')
                .next()
                .and_then(|column| column.trim().rsplit('.').next())
                .unwrap_or("value")
                .to_string();
            return PaisaError::Duplicate { field };
        }
    }
    query_err(e)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_err(idx, e))
}

fn opt_timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

/// Parse a text column holding one of the domain's string enums.
fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = PaisaError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn day(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn money(value: Decimal) -> String {
    value.normalize().to_string()
}

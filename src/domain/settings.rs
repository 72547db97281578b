//! Validated application settings read through [`ConfigPort`].
//!
//! Every key has a default except `[database] path`; values that are
//! present but out of range are rejected rather than silently replaced.

use crate::domain::error::PaisaError;
use crate::domain::money::{BALANCE_DIGITS, check_money};
use crate::domain::progress::QuizRewards;
use crate::ports::config_port::ConfigPort;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_POOL_SIZE: i64 = 8;
pub const DEFAULT_SESSION_LIFETIME: i64 = 14 * 24 * 60 * 60;
pub const DEFAULT_INITIAL_CASH: &str = "100000.00";
pub const SESSION_SECRET_HEX_LEN: usize = 128;

pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "Food & Dining",
    "Transportation",
    "Shopping",
    "Entertainment",
    "Bills & Utilities",
    "Healthcare",
    "Education",
    "Other",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: String,
    pub pool_size: u32,
    pub listen: String,
    /// Hex-encoded cookie signing key; a random key is used when absent.
    pub session_secret: Option<String>,
    /// Seconds of inactivity before a session expires.
    pub session_lifetime: i64,
    pub secure_cookies: bool,
    pub initial_cash: Decimal,
    pub quiz_rewards: QuizRewards,
    pub default_categories: Vec<String>,
}

/// The subset of settings the store needs when it creates rows or awards
/// rewards.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    pub initial_cash: Decimal,
    pub quiz_rewards: QuizRewards,
    pub default_categories: Vec<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::new(100_000_00, 2),
            quiz_rewards: QuizRewards::default(),
            default_categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&Settings> for StoreOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            initial_cash: settings.initial_cash,
            quiz_rewards: settings.quiz_rewards,
            default_categories: settings.default_categories.clone(),
        }
    }
}

impl Settings {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::from(self)
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PaisaError> {
        let rewards = QuizRewards::default();
        Ok(Settings {
            database_path: required_string(config, "database", "path")?,
            pool_size: positive_int(config, "database", "pool_size", DEFAULT_POOL_SIZE)? as u32,
            listen: config
                .get_string("web", "listen")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            session_secret: session_secret(config)?,
            session_lifetime: positive_int(
                config,
                "auth",
                "session_lifetime",
                DEFAULT_SESSION_LIFETIME,
            )?,
            secure_cookies: config.get_bool("auth", "secure_cookies", false),
            initial_cash: initial_cash(config)?,
            quiz_rewards: QuizRewards {
                points_per_quiz: non_negative_int(
                    config,
                    "rewards",
                    "points_per_quiz",
                    rewards.points_per_quiz,
                )?,
                tokens_pass: non_negative_int(
                    config,
                    "rewards",
                    "quiz_tokens_pass",
                    rewards.tokens_pass,
                )?,
                tokens_high: non_negative_int(
                    config,
                    "rewards",
                    "quiz_tokens_high",
                    rewards.tokens_high,
                )?,
                tokens_perfect: non_negative_int(
                    config,
                    "rewards",
                    "quiz_tokens_perfect",
                    rewards.tokens_perfect,
                )?,
            },
            default_categories: config
                .get_list("budget", "default_categories")
                .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()),
        })
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PaisaError {
    PaisaError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, PaisaError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(PaisaError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// `Ok(None)` when absent, an error when present but not a number.
fn parse_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, PaisaError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{raw}' is not an integer"))),
    }
}

fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PaisaError> {
    let value = parse_int(config, section, key)?.unwrap_or(default);
    if value < 1 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PaisaError> {
    let value = parse_int(config, section, key)?.unwrap_or(default);
    if value < 0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn session_secret(config: &dyn ConfigPort) -> Result<Option<String>, PaisaError> {
    let Some(secret) = config
        .get_string("auth", "session_secret")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };
    if secret.len() != SESSION_SECRET_HEX_LEN || !secret.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            "auth",
            "session_secret",
            format!("session_secret must be {SESSION_SECRET_HEX_LEN} hex characters"),
        ));
    }
    Ok(Some(secret))
}

fn initial_cash(config: &dyn ConfigPort) -> Result<Decimal, PaisaError> {
    let raw = config
        .get_string("portfolio", "initial_cash")
        .unwrap_or_else(|| DEFAULT_INITIAL_CASH.to_string());
    let value = Decimal::from_str(raw.trim()).map_err(|_| {
        invalid("portfolio", "initial_cash", format!("'{raw}' is not a decimal amount"))
    })?;
    if value <= Decimal::ZERO {
        return Err(invalid(
            "portfolio",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    check_money("initial_cash", value, BALANCE_DIGITS).map_err(|e| match e {
        PaisaError::Validation { reason, .. } => invalid("portfolio", "initial_cash", reason),
        other => other,
    })?;
    Ok(value)
}

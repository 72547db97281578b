//! Users, profiles and the gamification read models built on them.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PaisaError;
use super::goals::FinancialGoal;
use super::money::{AMOUNT_DIGITS, check_money};
use super::portfolio::{PortfolioSummary, VirtualTransaction};

pub const MIN_AGE: i64 = 16;
pub const MAX_AGE: i64 = 35;
pub const MIN_PASSWORD_LEN: usize = 8;

/// The authenticated caller. Every store operation that touches user-owned
/// rows takes one of these instead of reading ambient session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: i64,
    pub username: String,
}

impl UserContext {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FinancialExperience {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl FinancialExperience {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialExperience::Beginner => "beginner",
            FinancialExperience::Intermediate => "intermediate",
            FinancialExperience::Advanced => "advanced",
        }
    }
}

impl fmt::Display for FinancialExperience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FinancialExperience {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(FinancialExperience::Beginner),
            "intermediate" => Ok(FinancialExperience::Intermediate),
            "advanced" => Ok(FinancialExperience::Advanced),
            other => Err(PaisaError::validation(
                "financial_experience",
                format!("unknown level '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone_number: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i64>,
    pub occupation: String,
    pub monthly_income: Decimal,
    pub financial_experience: FinancialExperience,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn context(&self) -> UserContext {
        UserContext::new(self.id, self.username.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub total_points: i64,
    pub level: i64,
    pub streak_days: i64,
    pub last_activity: DateTime<Utc>,
}

/// Registration input. The password travels separately so it is never
/// stored on a record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub monthly_income: Decimal,
    #[serde(default)]
    pub financial_experience: FinancialExperience,
}

impl NewUser {
    pub fn validate(&self, password: &str) -> Result<(), PaisaError> {
        validate_username(&self.username)?;
        validate_password(password)?;
        validate_email(&self.email)?;
        validate_phone(self.phone_number.as_deref())?;
        validate_age(self.age)?;
        validate_income(self.monthly_income)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub monthly_income: Decimal,
    #[serde(default)]
    pub financial_experience: FinancialExperience,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), PaisaError> {
        validate_email(&self.email)?;
        validate_phone(self.phone_number.as_deref())?;
        validate_age(self.age)?;
        validate_income(self.monthly_income)?;
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), PaisaError> {
    let len = username.chars().count();
    if !(3..=150).contains(&len) {
        return Err(PaisaError::validation(
            "username",
            "must be between 3 and 150 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(PaisaError::validation(
            "username",
            "may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), PaisaError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PaisaError::validation(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaisaError::validation("password", "cannot be entirely numeric"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), PaisaError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(PaisaError::validation("email", "enter a valid email address")),
    }
}

pub fn validate_phone(phone: Option<&str>) -> Result<(), PaisaError> {
    match phone {
        Some(p) if p.chars().count() > 15 => Err(PaisaError::validation(
            "phone_number",
            "must be at most 15 characters",
        )),
        _ => Ok(()),
    }
}

pub fn validate_age(age: Option<i64>) -> Result<(), PaisaError> {
    match age {
        Some(a) if !(MIN_AGE..=MAX_AGE).contains(&a) => Err(PaisaError::validation(
            "age",
            format!("must be between {MIN_AGE} and {MAX_AGE}"),
        )),
        _ => Ok(()),
    }
}

pub fn validate_income(income: Decimal) -> Result<(), PaisaError> {
    if income < Decimal::ZERO {
        return Err(PaisaError::validation(
            "monthly_income",
            "cannot be negative",
        ));
    }
    check_money("monthly_income", income, AMOUNT_DIGITS)
}

/// Blank phone numbers are stored as NULL so the unique index ignores them.
pub fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

pub fn hash_password(password: &str) -> Result<String, PaisaError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PaisaError::Internal {
            reason: format!("password hashing failed: {e}"),
        })
}

pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(password_hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub total_points: i64,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub top_users: Vec<LeaderboardEntry>,
    pub user_rank: i64,
    pub user_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_points: i64,
    pub level: i64,
    pub streak_days: i64,
    pub modules_completed: i64,
    pub total_modules: i64,
    pub scenarios_completed: i64,
    pub total_scenarios: i64,
    pub completion_rate: f64,
}

/// Completed share in percent; 0 when there is nothing to complete.
pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total > 0 {
        completed as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStats {
    pub total_users: i64,
    pub total_modules: i64,
    pub total_scenarios: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub profile: UserProfile,
    pub portfolio: PortfolioSummary,
    pub completed_modules: i64,
    pub total_modules: i64,
    pub progress_percentage: f64,
    pub recent_transactions: Vec<VirtualTransaction>,
    pub active_goals: Vec<FinancialGoal>,
    pub monthly_expenses: Decimal,
    pub token_balance: i64,
}

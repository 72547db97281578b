//! Reward tokens: the signed credit log, packages and the coupon marketplace.
//!
//! The log is the only source of truth. Balance and lifetime totals are
//! folded from it on read; nothing caches them.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PaisaError;

pub const COUPON_CODE_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Earn,
    Spend,
    Purchase,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Earn => "earn",
            TokenKind::Spend => "spend",
            TokenKind::Purchase => "purchase",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earn" => Ok(TokenKind::Earn),
            "spend" => Ok(TokenKind::Spend),
            "purchase" => Ok(TokenKind::Purchase),
            other => Err(PaisaError::validation("kind", format!("unknown token kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenTransaction {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub balance_after: i64,
    pub kind: TokenKind,
    pub description: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// A user's token position, derived from their log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct TokenAccount {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

impl TokenAccount {
    pub fn from_amounts<I: IntoIterator<Item = i64>>(amounts: I) -> Self {
        amounts
            .into_iter()
            .fold(TokenAccount::default(), |mut acc, amount| {
                acc.balance += amount;
                if amount > 0 {
                    acc.total_earned += amount;
                } else {
                    acc.total_spent -= amount;
                }
                acc
            })
    }
}

/// A credit or debit request before it becomes a log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub amount: i64,
    pub kind: TokenKind,
    pub description: String,
    pub reference: String,
}

impl TokenEntry {
    pub fn earn(amount: i64, description: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            amount,
            kind: TokenKind::Earn,
            description: description.into(),
            reference: reference.into(),
        }
    }

    pub fn spend(amount: i64, description: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            amount: -amount,
            kind: TokenKind::Spend,
            description: description.into(),
            reference: reference.into(),
        }
    }

    pub fn purchase(amount: i64, description: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            amount,
            kind: TokenKind::Purchase,
            description: description.into(),
            reference: reference.into(),
        }
    }

    /// Balance after applying this entry to `balance`, or the reason it
    /// cannot be applied.
    pub fn apply_to(&self, balance: i64) -> Result<i64, PaisaError> {
        if self.amount == 0 {
            return Err(PaisaError::InvalidAmount {
                reason: "token amount must be non-zero".into(),
            });
        }
        if self.kind == TokenKind::Spend {
            if self.amount > 0 {
                return Err(PaisaError::InvalidAmount {
                    reason: "spend amount must be positive".into(),
                });
            }
            if balance + self.amount < 0 {
                return Err(PaisaError::InsufficientTokens {
                    required: -self.amount,
                    available: balance,
                });
            }
        } else if self.amount < 0 {
            return Err(PaisaError::InvalidAmount {
                reason: "earned amount must be positive".into(),
            });
        }
        Ok(balance + self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPackage {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub tokens: i64,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Inactive,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for CouponStatus {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CouponStatus::Active),
            "inactive" => Ok(CouponStatus::Inactive),
            other => Err(PaisaError::validation("status", format!("unknown coupon status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    pub code_prefix: String,
    pub token_cost: i64,
    pub stock: i64,
    #[serde(default)]
    pub used: i64,
    pub status: CouponStatus,
    pub valid_until: DateTime<Utc>,
}

impl Coupon {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status == CouponStatus::Active && self.used < self.stock && now < self.valid_until
    }

    pub fn remaining(&self) -> i64 {
        (self.stock - self.used).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserCouponStatus {
    Active,
    Redeemed,
}

impl UserCouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserCouponStatus::Active => "active",
            UserCouponStatus::Redeemed => "redeemed",
        }
    }
}

impl FromStr for UserCouponStatus {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserCouponStatus::Active),
            "redeemed" => Ok(UserCouponStatus::Redeemed),
            other => Err(PaisaError::validation("status", format!("unknown user coupon status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCoupon {
    pub id: i64,
    pub user_id: i64,
    pub coupon_id: i64,
    pub title: String,
    pub code: String,
    pub status: UserCouponStatus,
    pub purchased_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

/// Outcome of a successful coupon purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponPurchase {
    pub user_coupon: UserCoupon,
    pub new_balance: i64,
}

/// Ordered purchase checks: availability, then funds, then ownership.
pub fn check_coupon_purchase(
    coupon: &Coupon,
    balance: i64,
    holds_active_copy: bool,
    now: DateTime<Utc>,
) -> Result<(), PaisaError> {
    if !coupon.is_available(now) {
        return Err(PaisaError::CouponUnavailable);
    }
    if balance < coupon.token_cost {
        return Err(PaisaError::InsufficientTokens {
            required: coupon.token_cost,
            available: balance,
        });
    }
    if holds_active_copy {
        return Err(PaisaError::DuplicateCoupon);
    }
    Ok(())
}

/// `<prefix><four digits>`; callers retry on collision.
pub fn generate_coupon_code<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(1000..=9999);
    format!("{prefix}{suffix}")
}

//! Savings goals with incremental contributions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PaisaError;
use super::money::{self, BALANCE_DIGITS, check_money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    EmergencyFund,
    Travel,
    Gadget,
    Education,
    Investment,
    Other,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::EmergencyFund => "emergency_fund",
            GoalType::Travel => "travel",
            GoalType::Gadget => "gadget",
            GoalType::Education => "education",
            GoalType::Investment => "investment",
            GoalType::Other => "other",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emergency_fund" => Ok(GoalType::EmergencyFund),
            "travel" => Ok(GoalType::Travel),
            "gadget" => Ok(GoalType::Gadget),
            "education" => Ok(GoalType::Education),
            "investment" => Ok(GoalType::Investment),
            "other" => Ok(GoalType::Other),
            other => Err(PaisaError::validation(
                "goal_type",
                format!("unknown goal type '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialGoal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub goal_type: GoalType,
    pub target_amount: Decimal,
    pub saved_amount: Decimal,
    pub target_date: NaiveDate,
    pub is_achieved: bool,
    pub created_at: DateTime<Utc>,
}

impl FinancialGoal {
    /// Saved over target as a percentage, capped at 100.
    pub fn progress_percentage(&self) -> Decimal {
        if self.target_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        money::percent(self.saved_amount, self.target_amount)
            .unwrap_or(Decimal::ONE_HUNDRED)
            .min(Decimal::ONE_HUNDRED)
    }

    pub fn remaining(&self) -> Decimal {
        (self.target_amount - self.saved_amount).max(Decimal::ZERO)
    }

    /// Apply a contribution, returning the new saved amount and whether the
    /// goal is now achieved.
    pub fn contribute(&self, amount: Decimal) -> Result<(Decimal, bool), PaisaError> {
        if self.is_achieved {
            return Err(PaisaError::InvalidAmount {
                reason: "goal is already achieved".into(),
            });
        }
        if amount < Decimal::ONE {
            return Err(PaisaError::InvalidAmount {
                reason: "contribution must be at least 1".into(),
            });
        }
        check_money("amount", amount, BALANCE_DIGITS)?;
        let remaining = self.remaining();
        if amount > remaining {
            return Err(PaisaError::InvalidAmount {
                reason: format!("contribution exceeds the remaining {remaining}"),
            });
        }
        let saved = money::add(self.saved_amount, amount)?;
        Ok((saved, saved >= self.target_amount))
    }
}

/// Goal as listed to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: FinancialGoal,
    pub progress_percentage: Decimal,
}

impl From<FinancialGoal> for GoalView {
    fn from(goal: FinancialGoal) -> Self {
        GoalView {
            progress_percentage: goal.progress_percentage(),
            goal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewGoal {
    pub title: String,
    pub goal_type: GoalType,
    pub target_amount: Decimal,
    pub target_date: NaiveDate,
}

impl NewGoal {
    pub fn validate(&self, today: NaiveDate) -> Result<(), PaisaError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(PaisaError::validation("title", "cannot be empty"));
        }
        if title.chars().count() > 200 {
            return Err(PaisaError::validation("title", "must be at most 200 characters"));
        }
        if self.target_amount <= Decimal::ZERO {
            return Err(PaisaError::validation(
                "target_amount",
                "must be greater than zero",
            ));
        }
        check_money("target_amount", self.target_amount, BALANCE_DIGITS)?;
        if self.target_date <= today {
            return Err(PaisaError::validation(
                "target_date",
                "Target date must be in the future.",
            ));
        }
        Ok(())
    }
}

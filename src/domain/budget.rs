//! Budgets, their ordered categories, and expenses.
//!
//! Spent amounts are always summed from expense rows; budgets and
//! categories store only what the user allocated.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::PaisaError;
use super::money::{self, AMOUNT_DIGITS, check_money};

pub const RECENT_EXPENSES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub total_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetCategory {
    pub id: i64,
    pub budget_id: i64,
    pub name: String,
    pub allocated_amount: Decimal,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub allocated_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewBudget {
    pub name: String,
    pub total_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub categories: Vec<NewCategory>,
}

impl NewBudget {
    pub fn validate(&self, today: NaiveDate) -> Result<(), PaisaError> {
        if self.name.trim().is_empty() {
            return Err(PaisaError::validation("name", "cannot be empty"));
        }
        if self.total_amount <= Decimal::ZERO {
            return Err(PaisaError::validation("total_amount", "must be greater than zero"));
        }
        check_money("total_amount", self.total_amount, AMOUNT_DIGITS)?;
        if self.start_date >= self.end_date {
            return Err(PaisaError::validation("end_date", "End date must be after start date."));
        }
        if self.start_date < today {
            return Err(PaisaError::validation(
                "start_date",
                "Start date cannot be in the past.",
            ));
        }
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(PaisaError::validation("categories", "category name cannot be empty"));
            }
            if category.allocated_amount < Decimal::ZERO {
                return Err(PaisaError::validation(
                    "categories",
                    format!("allocation for '{}' cannot be negative", category.name),
                ));
            }
            check_money("categories", category.allocated_amount, AMOUNT_DIGITS)?;
        }
        Ok(())
    }

    /// Fill in zero-allocation defaults when the user supplied no categories.
    pub fn with_default_categories(mut self, defaults: &[String]) -> Self {
        if self.categories.is_empty() {
            self.categories = defaults
                .iter()
                .map(|name| NewCategory {
                    name: name.clone(),
                    allocated_amount: Decimal::ZERO,
                })
                .collect();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl NewExpense {
    pub fn validate(&self) -> Result<(), PaisaError> {
        if self.description.trim().is_empty() {
            return Err(PaisaError::validation("description", "cannot be empty"));
        }
        if self.description.chars().count() > 200 {
            return Err(PaisaError::validation("description", "must be at most 200 characters"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(PaisaError::InvalidAmount {
                reason: "expense amount must be greater than zero".into(),
            });
        }
        check_money("amount", self.amount, AMOUNT_DIGITS)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOverview {
    pub category: BudgetCategory,
    pub spent_amount: Decimal,
    pub remaining: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetOverview {
    pub budget: Budget,
    pub categories: Vec<CategoryOverview>,
    pub spent_amount: Decimal,
}

pub fn spent_by_category<'a, I>(expenses: I) -> Result<HashMap<i64, Decimal>, PaisaError>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut totals: HashMap<i64, Decimal> = HashMap::new();
    for expense in expenses {
        if let Some(category_id) = expense.category_id {
            let total = totals.entry(category_id).or_default();
            *total = money::add(*total, expense.amount)?;
        }
    }
    Ok(totals)
}

pub fn build_overview(
    budget: Budget,
    mut categories: Vec<BudgetCategory>,
    spent: &HashMap<i64, Decimal>,
) -> Result<BudgetOverview, PaisaError> {
    categories.sort_by_key(|c| c.position);
    let categories = categories
        .into_iter()
        .map(|category| {
            let spent_amount = spent.get(&category.id).copied().unwrap_or_default();
            Ok(CategoryOverview {
                remaining: money::sub(category.allocated_amount, spent_amount)?,
                spent_amount,
                category,
            })
        })
        .collect::<Result<Vec<CategoryOverview>, PaisaError>>()?;
    let spent_amount = money::sum(categories.iter().map(|c| c.spent_amount))?;
    Ok(BudgetOverview {
        budget,
        categories,
        spent_amount,
    })
}

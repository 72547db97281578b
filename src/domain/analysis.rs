//! Budget analysis: allocated-vs-spent, trailing trends, daily totals,
//! the health score and a simple expense forecast.
//!
//! Everything here is a pure read over expense rows the caller has already
//! scoped to the user.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::budget::{BudgetCategory, Expense};
use super::error::PaisaError;
use super::money;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;
pub const TREND_MONTHS: u32 = 6;
pub const FORECAST_MONTHS: u32 = 3;

/// Resolve a requested analysis period, defaulting to `today` and clamping
/// out-of-range values instead of rejecting them.
pub fn clamp_period(month: Option<i64>, year: Option<i64>, today: NaiveDate) -> (i32, u32) {
    let month = month.unwrap_or(today.month() as i64).clamp(1, 12) as u32;
    let year = year
        .unwrap_or(today.year() as i64)
        .clamp(MIN_YEAR as i64, MAX_YEAR as i64) as i32;
    (year, month)
}

/// Move `delta` calendar months from (year, month).
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), (index.rem_euclid(12) + 1) as u32)
}

pub fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = shift_month(year, month, 1);
    first_of_month(ny, nm)
        .signed_duration_since(first_of_month(year, month))
        .num_days() as u32
}

pub fn last_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)).unwrap_or(NaiveDate::MAX)
}

pub fn month_label(year: i32, month: u32) -> String {
    first_of_month(year, month).format("%b %Y").to_string()
}

fn in_month(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

fn month_total(expenses: &[Expense], year: i32, month: u32) -> Result<Decimal, PaisaError> {
    money::sum(
        expenses
            .iter()
            .filter(|e| in_month(e.date, year, month))
            .map(|e| e.amount),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
}

/// Totals for the month containing `today` and the `count - 1` before it,
/// newest first.
pub fn monthly_totals(
    expenses: &[Expense],
    today: NaiveDate,
    count: u32,
) -> Result<Vec<MonthTotal>, PaisaError> {
    (0..count as i32)
        .map(|back| {
            let (year, month) = shift_month(today.year(), today.month(), -back);
            Ok(MonthTotal {
                label: month_label(year, month),
                year,
                month,
                total: month_total(expenses, year, month)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAnalysis {
    pub category_id: i64,
    pub name: String,
    pub allocated: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percent_used: Decimal,
    pub over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub day: u32,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAnalysis {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub categories: Vec<CategoryAnalysis>,
    pub total_allocated: Decimal,
    pub total_spent: Decimal,
    pub uncategorized_spent: Decimal,
    pub monthly_trend: Vec<MonthTotal>,
    pub daily_totals: Vec<DailyTotal>,
    pub income: Decimal,
    pub savings: Decimal,
    pub savings_rate: Decimal,
    pub over_budget_count: usize,
    pub health_score: u32,
}

/// Heuristic 0–100 wellness score.
///
/// Deductions: savings rate below 10% costs 50, below 20% costs 30; each
/// over-budget category costs 15; spending more than income costs 40.
pub fn health_score(
    savings_rate: Decimal,
    over_budget_count: usize,
    total_expenses: Decimal,
    income: Decimal,
) -> u32 {
    let mut score: i64 = 100;
    if savings_rate < Decimal::TEN {
        score -= 50;
    } else if savings_rate < Decimal::from(20) {
        score -= 30;
    }
    score -= 15 * over_budget_count as i64;
    if total_expenses > income {
        score -= 40;
    }
    score.max(0) as u32
}

pub fn savings_rate(income: Decimal, spent: Decimal) -> Result<Decimal, PaisaError> {
    money::percent(money::sub(income, spent)?, income)
}

/// Analyse one month. `categories` are those of the user's active budgets;
/// `expenses` must cover at least the trend window ending at (year, month).
pub fn analyze(
    categories: &[BudgetCategory],
    expenses: &[Expense],
    income: Decimal,
    year: i32,
    month: u32,
) -> Result<BudgetAnalysis, PaisaError> {
    let month_expenses: Vec<&Expense> = expenses
        .iter()
        .filter(|e| in_month(e.date, year, month))
        .collect();

    let category_rows = categories
        .iter()
        .map(|c| {
            let spent = money::sum(
                month_expenses
                    .iter()
                    .filter(|e| e.category_id == Some(c.id))
                    .map(|e| e.amount),
            )?;
            Ok(CategoryAnalysis {
                category_id: c.id,
                name: c.name.clone(),
                allocated: c.allocated_amount,
                spent,
                remaining: money::sub(c.allocated_amount, spent)?,
                percent_used: money::percent(spent, c.allocated_amount)?,
                over_budget: spent > c.allocated_amount,
            })
        })
        .collect::<Result<Vec<CategoryAnalysis>, PaisaError>>()?;

    let total_spent = money::sum(month_expenses.iter().map(|e| e.amount))?;
    let categorized = money::sum(category_rows.iter().map(|c| c.spent))?;
    let total_allocated = money::sum(category_rows.iter().map(|c| c.allocated))?;
    let over_budget_count = category_rows.iter().filter(|c| c.over_budget).count();

    let mut daily: BTreeMap<u32, Decimal> = (1..=days_in_month(year, month))
        .map(|day| (day, Decimal::ZERO))
        .collect();
    for e in &month_expenses {
        let total = daily.entry(e.date.day()).or_default();
        *total = money::add(*total, e.amount)?;
    }

    let monthly_trend = (0..TREND_MONTHS as i32)
        .rev()
        .map(|back| {
            let (y, m) = shift_month(year, month, -back);
            Ok(MonthTotal {
                label: month_label(y, m),
                year: y,
                month: m,
                total: month_total(expenses, y, m)?,
            })
        })
        .collect::<Result<Vec<MonthTotal>, PaisaError>>()?;

    let rate = savings_rate(income, total_spent)?;
    Ok(BudgetAnalysis {
        year,
        month,
        label: month_label(year, month),
        categories: category_rows,
        total_allocated,
        total_spent,
        uncategorized_spent: money::sub(total_spent, categorized)?,
        monthly_trend,
        daily_totals: daily
            .into_iter()
            .map(|(day, total)| DailyTotal { day, total })
            .collect(),
        income,
        savings: money::sub(income, total_spent)?,
        savings_rate: rate,
        over_budget_count,
        health_score: health_score(rate, over_budget_count, total_spent, income),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryForecast {
    pub name: String,
    pub average: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseForecast {
    pub month_label: String,
    pub overall_forecast: Decimal,
    pub categories: Vec<CategoryForecast>,
    pub last_month_total: Decimal,
    pub previous_month_total: Decimal,
    pub trend_amount: Decimal,
    pub trend: Trend,
    pub month_to_date: Decimal,
    pub projected_month_total: Decimal,
}

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Forecast the month containing `today` from the three completed months
/// before it. `category_names` resolves category ids; unknown or missing
/// ids fall under [`UNCATEGORIZED`].
pub fn forecast(
    expenses: &[Expense],
    category_names: &BTreeMap<i64, String>,
    today: NaiveDate,
) -> Result<ExpenseForecast, PaisaError> {
    let window: Vec<(i32, u32)> = (1..=FORECAST_MONTHS as i32)
        .map(|back| shift_month(today.year(), today.month(), -back))
        .collect();
    let divisor = Decimal::from(FORECAST_MONTHS);

    let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut window_total = Decimal::ZERO;
    for e in expenses {
        if window.iter().any(|&(y, m)| in_month(e.date, y, m)) {
            let name = e
                .category_id
                .and_then(|id| category_names.get(&id).cloned())
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            let total = by_category.entry(name).or_default();
            *total = money::add(*total, e.amount)?;
            window_total = money::add(window_total, e.amount)?;
        }
    }

    let (ly, lm) = window[0];
    let (py, pm) = window[1];
    let last_month_total = month_total(expenses, ly, lm)?;
    let previous_month_total = month_total(expenses, py, pm)?;
    let trend_amount = money::sub(last_month_total, previous_month_total)?;
    let trend = if trend_amount > Decimal::ZERO {
        Trend::Rising
    } else if trend_amount < Decimal::ZERO {
        Trend::Falling
    } else {
        Trend::Flat
    };

    let month_to_date = money::sum(
        expenses
            .iter()
            .filter(|e| in_month(e.date, today.year(), today.month()) && e.date <= today)
            .map(|e| e.amount),
    )?;
    let projected_month_total = money::mul(
        money::div(month_to_date, Decimal::from(today.day()))?,
        Decimal::from(days_in_month(today.year(), today.month())),
    )?
    .round_dp(2);

    Ok(ExpenseForecast {
        month_label: month_label(today.year(), today.month()),
        overall_forecast: money::div(window_total, divisor)?.round_dp(2),
        categories: by_category
            .into_iter()
            .map(|(name, total)| {
                Ok(CategoryForecast {
                    name,
                    average: money::div(total, divisor)?.round_dp(2),
                })
            })
            .collect::<Result<Vec<CategoryForecast>, PaisaError>>()?,
        last_month_total,
        previous_month_total,
        trend_amount,
        trend,
        month_to_date,
        projected_month_total,
    })
}

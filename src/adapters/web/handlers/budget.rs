//! Budgets, expenses and the spending analysis built on them.

use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{checkbox, current_user, parse_date, parse_decimal, parse_optional_int, query_number, today};
use crate::adapters::web::AppState;
use crate::adapters::web::auth::AuthSession;
use crate::adapters::web::error::WebError;
use crate::domain::analysis::{BudgetAnalysis, ExpenseForecast, TREND_MONTHS};
use crate::domain::budget::{BudgetOverview, Expense, NewBudget, NewExpense, RECENT_EXPENSES};
use crate::domain::error::PaisaError;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub month: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseForm {
    pub description: String,
    pub amount: String,
    pub date: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub is_recurring: Option<String>,
}

impl TryFrom<ExpenseForm> for NewExpense {
    type Error = PaisaError;

    fn try_from(form: ExpenseForm) -> Result<Self, Self::Error> {
        Ok(NewExpense {
            description: form.description.trim().to_string(),
            amount: parse_decimal("amount", &form.amount)?,
            date: parse_date("date", &form.date)?,
            category_id: parse_optional_int("category_id", form.category_id.as_deref())?,
            is_recurring: checkbox(form.is_recurring.as_deref()),
        })
    }
}

pub async fn budgets(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Vec<BudgetOverview>>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.list_budgets(&user)?))
}

/// Categories are optional; the configured defaults fill an empty list.
pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(budget): Json<NewBudget>,
) -> Result<(StatusCode, Json<BudgetOverview>), WebError> {
    let user = current_user(&auth)?;
    let overview = state.store.create_budget(&user, &budget, today())?;
    Ok((StatusCode::CREATED, Json(overview)))
}

pub async fn analysis(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<BudgetAnalysis>, WebError> {
    let user = current_user(&auth)?;
    let month = query_number(query.month.as_deref());
    let year = query_number(query.year.as_deref());
    Ok(Json(state.store.budget_analysis(&user, month, year, today())?))
}

pub async fn expenses(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<serde_json::Value>, WebError> {
    let user = current_user(&auth)?;
    let recent = state.store.recent_expenses(&user, RECENT_EXPENSES)?;
    let monthly = state
        .store
        .monthly_expense_totals(&user, today(), TREND_MONTHS)?;
    Ok(Json(json!({ "expenses": recent, "monthly_totals": monthly })))
}

pub async fn add_expense(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Form(form): Form<ExpenseForm>,
) -> Result<(StatusCode, Json<Expense>), WebError> {
    let user = current_user(&auth)?;
    let expense = NewExpense::try_from(form)?;
    Ok((StatusCode::CREATED, Json(state.store.add_expense(&user, &expense)?)))
}

pub async fn predictor(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<ExpenseForecast>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.expense_forecast(&user, today())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn expense_form_converts() {
        let expense = NewExpense::try_from(ExpenseForm {
            description: " Groceries ".into(),
            amount: "450.75".into(),
            date: "2024-05-02".into(),
            category_id: Some("3".into()),
            is_recurring: Some("on".into()),
        })
        .unwrap();
        assert_eq!(expense.description, "Groceries");
        assert_eq!(expense.amount, dec!(450.75));
        assert_eq!(expense.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(expense.category_id, Some(3));
        assert!(expense.is_recurring);
    }

    #[test]
    fn expense_form_without_category() {
        let expense = NewExpense::try_from(ExpenseForm {
            description: "Bus".into(),
            amount: "20".into(),
            date: "2024-05-02".into(),
            category_id: Some(String::new()),
            is_recurring: None,
        })
        .unwrap();
        assert_eq!(expense.category_id, None);
        assert!(!expense.is_recurring);
    }

    #[test]
    fn expense_form_rejects_bad_amount() {
        let result = NewExpense::try_from(ExpenseForm {
            description: "Bus".into(),
            amount: "twenty".into(),
            date: "2024-05-02".into(),
            category_id: None,
            is_recurring: None,
        });
        assert!(matches!(result, Err(PaisaError::Validation { .. })));
    }
}

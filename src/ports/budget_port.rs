//! Budgets, expenses and the reports derived from them.

use chrono::NaiveDate;

use crate::domain::analysis::{BudgetAnalysis, ExpenseForecast, MonthTotal};
use crate::domain::budget::{BudgetOverview, Expense, NewBudget, NewExpense};
use crate::domain::error::PaisaError;
use crate::domain::user::UserContext;

pub trait BudgetPort {
    fn create_budget(
        &self,
        user: &UserContext,
        budget: &NewBudget,
        today: NaiveDate,
    ) -> Result<BudgetOverview, PaisaError>;

    fn add_expense(&self, user: &UserContext, expense: &NewExpense) -> Result<Expense, PaisaError>;

    fn deactivate_budget(&self, user: &UserContext, budget_id: i64) -> Result<(), PaisaError>;

    /// Active budgets with spent amounts summed from expenses.
    fn list_budgets(&self, user: &UserContext) -> Result<Vec<BudgetOverview>, PaisaError>;

    fn recent_expenses(&self, user: &UserContext, limit: usize)
    -> Result<Vec<Expense>, PaisaError>;

    fn monthly_expense_totals(
        &self,
        user: &UserContext,
        today: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthTotal>, PaisaError>;

    fn budget_analysis(
        &self,
        user: &UserContext,
        month: Option<i64>,
        year: Option<i64>,
        today: NaiveDate,
    ) -> Result<BudgetAnalysis, PaisaError>;

    fn expense_forecast(
        &self,
        user: &UserContext,
        today: NaiveDate,
    ) -> Result<ExpenseForecast, PaisaError>;
}

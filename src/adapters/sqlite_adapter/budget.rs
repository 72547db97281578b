//! Budgets, categories, expenses and the monthly reports built on them.

use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;

use super::{
    SqliteStore, date_col, day, decimal_col, money, query_err, timestamp_col, ts, users,
};
use crate::domain::analysis::{
    BudgetAnalysis, ExpenseForecast, FORECAST_MONTHS, MonthTotal, TREND_MONTHS, analyze,
    clamp_period, first_of_month, forecast, last_of_month, monthly_totals, shift_month,
};
use crate::domain::budget::{
    Budget, BudgetCategory, BudgetOverview, Expense, NewBudget, NewExpense, build_overview,
    spent_by_category,
};
use crate::domain::error::PaisaError;
use crate::domain::user::UserContext;
use crate::ports::budget_port::BudgetPort;

const EXPENSE_COLUMNS: &str =
    "id, user_id, category_id, description, amount, date, is_recurring, created_at";

fn budget_from_row(row: &Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        total_amount: decimal_col(row, 3)?,
        start_date: date_col(row, 4)?,
        end_date: date_col(row, 5)?,
        is_active: row.get(6)?,
        created_at: timestamp_col(row, 7)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<BudgetCategory> {
    Ok(BudgetCategory {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        name: row.get(2)?,
        allocated_amount: decimal_col(row, 3)?,
        position: row.get(4)?,
    })
}

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        description: row.get(3)?,
        amount: decimal_col(row, 4)?,
        date: date_col(row, 5)?,
        is_recurring: row.get(6)?,
        created_at: timestamp_col(row, 7)?,
    })
}

/// Expenses dated within `from..=to`, newest first.
pub(super) fn load_expenses_between(
    conn: &Connection,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Expense>, PaisaError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date DESC, id DESC"
        ))
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id, day(from), day(to)], expense_from_row)
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

fn load_categorized_expenses(conn: &Connection, user_id: i64) -> Result<Vec<Expense>, PaisaError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses
             WHERE user_id = ?1 AND category_id IS NOT NULL"
        ))
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id], expense_from_row)
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

fn load_budget(conn: &Connection, user_id: i64, budget_id: i64) -> Result<Budget, PaisaError> {
    conn.query_row(
        "SELECT id, user_id, name, total_amount, start_date, end_date, is_active, created_at
         FROM budgets WHERE id = ?1 AND user_id = ?2",
        params![budget_id, user_id],
        budget_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("budget", budget_id))
}

fn load_active_budgets(conn: &Connection, user_id: i64) -> Result<Vec<Budget>, PaisaError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, name, total_amount, start_date, end_date, is_active, created_at
             FROM budgets WHERE user_id = ?1 AND is_active = 1
             ORDER BY created_at DESC, id DESC",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id], budget_from_row)
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

/// Categories of the user's budgets; `active_only` skips deactivated ones.
fn load_categories(
    conn: &Connection,
    user_id: i64,
    active_only: bool,
) -> Result<Vec<BudgetCategory>, PaisaError> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.budget_id, c.name, c.allocated_amount, c.position
             FROM budget_categories c JOIN budgets b ON b.id = c.budget_id
             WHERE b.user_id = ?1 AND (b.is_active = 1 OR ?2 = 0)
             ORDER BY c.budget_id, c.position",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id, active_only], category_from_row)
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

fn overviews(conn: &Connection, user_id: i64) -> Result<Vec<BudgetOverview>, PaisaError> {
    let budgets = load_active_budgets(conn, user_id)?;
    let categories = load_categories(conn, user_id, true)?;
    let spent = spent_by_category(&load_categorized_expenses(conn, user_id)?)?;
    budgets
        .into_iter()
        .map(|budget| {
            let own = categories
                .iter()
                .filter(|c| c.budget_id == budget.id)
                .cloned()
                .collect();
            build_overview(budget, own, &spent)
        })
        .collect()
}

impl BudgetPort for SqliteStore {
    fn create_budget(
        &self,
        user: &UserContext,
        budget: &NewBudget,
        today: NaiveDate,
    ) -> Result<BudgetOverview, PaisaError> {
        let budget = budget
            .clone()
            .with_default_categories(&self.options().default_categories);
        budget.validate(today)?;

        self.write(|tx| {
            tx.execute(
                "INSERT INTO budgets (user_id, name, total_amount, start_date, end_date, is_active,
                     created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    user.user_id,
                    budget.name.trim(),
                    money(budget.total_amount),
                    day(budget.start_date),
                    day(budget.end_date),
                    ts(Utc::now()),
                ],
            )
            .map_err(query_err)?;
            let budget_id = tx.last_insert_rowid();

            for (position, category) in budget.categories.iter().enumerate() {
                tx.execute(
                    "INSERT INTO budget_categories (budget_id, name, allocated_amount, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        budget_id,
                        category.name.trim(),
                        money(category.allocated_amount),
                        position as i64
                    ],
                )
                .map_err(query_err)?;
            }

            let stored = load_budget(tx, user.user_id, budget_id)?;
            let categories = load_categories(tx, user.user_id, false)?
                .into_iter()
                .filter(|c| c.budget_id == budget_id)
                .collect();
            build_overview(stored, categories, &Default::default())
        })
    }

    fn add_expense(&self, user: &UserContext, expense: &NewExpense) -> Result<Expense, PaisaError> {
        expense.validate()?;
        let now = Utc::now();

        self.write(|tx| {
            if let Some(category_id) = expense.category_id {
                let owned: bool = tx
                    .query_row(
                        "SELECT EXISTS (SELECT 1 FROM budget_categories c
                             JOIN budgets b ON b.id = c.budget_id
                             WHERE c.id = ?1 AND b.user_id = ?2 AND b.is_active = 1)",
                        params![category_id, user.user_id],
                        |row| row.get(0),
                    )
                    .map_err(query_err)?;
                if !owned {
                    return Err(PaisaError::not_found("budget category", category_id));
                }
            }

            tx.execute(
                "INSERT INTO expenses (user_id, category_id, description, amount, date,
                     is_recurring, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.user_id,
                    expense.category_id,
                    expense.description.trim(),
                    money(expense.amount),
                    day(expense.date),
                    expense.is_recurring,
                    ts(now),
                ],
            )
            .map_err(query_err)?;

            Ok(Expense {
                id: tx.last_insert_rowid(),
                user_id: user.user_id,
                category_id: expense.category_id,
                description: expense.description.trim().to_string(),
                amount: expense.amount,
                date: expense.date,
                is_recurring: expense.is_recurring,
                created_at: now,
            })
        })
    }

    fn deactivate_budget(&self, user: &UserContext, budget_id: i64) -> Result<(), PaisaError> {
        self.write(|tx| {
            let changed = tx
                .execute(
                    "UPDATE budgets SET is_active = 0 WHERE id = ?1 AND user_id = ?2",
                    params![budget_id, user.user_id],
                )
                .map_err(query_err)?;
            if changed == 0 {
                return Err(PaisaError::not_found("budget", budget_id));
            }
            Ok(())
        })
    }

    fn list_budgets(&self, user: &UserContext) -> Result<Vec<BudgetOverview>, PaisaError> {
        let conn = self.conn()?;
        overviews(&conn, user.user_id)
    }

    fn recent_expenses(
        &self,
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<Expense>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_id = ?1
                 ORDER BY date DESC, id DESC LIMIT ?2"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user.user_id, limit as i64], expense_from_row)
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn monthly_expense_totals(
        &self,
        user: &UserContext,
        today: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthTotal>, PaisaError> {
        let months = months.max(1);
        let (from_year, from_month) = shift_month(today.year(), today.month(), 1 - months as i32);
        let conn = self.conn()?;
        let expenses = load_expenses_between(
            &conn,
            user.user_id,
            first_of_month(from_year, from_month),
            last_of_month(today.year(), today.month()),
        )?;
        monthly_totals(&expenses, today, months)
    }

    fn budget_analysis(
        &self,
        user: &UserContext,
        month: Option<i64>,
        year: Option<i64>,
        today: NaiveDate,
    ) -> Result<BudgetAnalysis, PaisaError> {
        let (year, month) = clamp_period(month, year, today);
        let conn = self.conn()?;
        let income = users::load_user(&conn, user.user_id)?.monthly_income;
        let categories = load_categories(&conn, user.user_id, true)?;
        let (from_year, from_month) = shift_month(year, month, 1 - TREND_MONTHS as i32);
        let expenses = load_expenses_between(
            &conn,
            user.user_id,
            first_of_month(from_year, from_month),
            last_of_month(year, month),
        )?;
        analyze(&categories, &expenses, income, year, month)
    }

    fn expense_forecast(
        &self,
        user: &UserContext,
        today: NaiveDate,
    ) -> Result<ExpenseForecast, PaisaError> {
        let conn = self.conn()?;
        let names: BTreeMap<i64, String> = load_categories(&conn, user.user_id, false)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let (from_year, from_month) =
            shift_month(today.year(), today.month(), -(FORECAST_MONTHS as i32));
        let expenses = load_expenses_between(
            &conn,
            user.user_id,
            first_of_month(from_year, from_month),
            last_of_month(today.year(), today.month()),
        )?;
        forecast(&expenses, &names, today)
    }
}

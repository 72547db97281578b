//! Savings goals.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

use super::{SqliteStore, date_col, day, decimal_col, enum_col, money, query_err, timestamp_col, ts};
use crate::domain::error::PaisaError;
use crate::domain::goals::{FinancialGoal, GoalView, NewGoal};
use crate::domain::user::UserContext;
use crate::ports::goal_port::GoalPort;

const GOAL_COLUMNS: &str = "id, user_id, title, goal_type, target_amount, saved_amount,
     target_date, is_achieved, created_at";

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<FinancialGoal> {
    Ok(FinancialGoal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        goal_type: enum_col(row, 3)?,
        target_amount: decimal_col(row, 4)?,
        saved_amount: decimal_col(row, 5)?,
        target_date: date_col(row, 6)?,
        is_achieved: row.get(7)?,
        created_at: timestamp_col(row, 8)?,
    })
}

/// All of a user's goals, newest first.
pub(super) fn load_goals(conn: &Connection, user_id: i64) -> Result<Vec<FinancialGoal>, PaisaError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM financial_goals WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id], goal_from_row)
        .map_err(query_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
}

fn load_goal(conn: &Connection, user_id: i64, goal_id: i64) -> Result<FinancialGoal, PaisaError> {
    conn.query_row(
        &format!("SELECT {GOAL_COLUMNS} FROM financial_goals WHERE id = ?1 AND user_id = ?2"),
        params![goal_id, user_id],
        goal_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("goal", goal_id))
}

impl GoalPort for SqliteStore {
    fn create_goal(
        &self,
        user: &UserContext,
        goal: &NewGoal,
        today: NaiveDate,
    ) -> Result<FinancialGoal, PaisaError> {
        goal.validate(today)?;
        self.write(|tx| {
            tx.execute(
                "INSERT INTO financial_goals (user_id, title, goal_type, target_amount,
                     saved_amount, target_date, is_achieved, created_at)
                 VALUES (?1, ?2, ?3, ?4, '0', ?5, 0, ?6)",
                params![
                    user.user_id,
                    goal.title.trim(),
                    goal.goal_type.as_str(),
                    money(goal.target_amount),
                    day(goal.target_date),
                    ts(Utc::now()),
                ],
            )
            .map_err(query_err)?;
            load_goal(tx, user.user_id, tx.last_insert_rowid())
        })
    }

    fn contribute(
        &self,
        user: &UserContext,
        goal_id: i64,
        amount: Decimal,
    ) -> Result<FinancialGoal, PaisaError> {
        self.write(|tx| {
            let goal = load_goal(tx, user.user_id, goal_id)?;
            let (saved, achieved) = goal.contribute(amount)?;
            tx.execute(
                "UPDATE financial_goals SET saved_amount = ?1, is_achieved = ?2 WHERE id = ?3",
                params![money(saved), achieved, goal.id],
            )
            .map_err(query_err)?;
            load_goal(tx, user.user_id, goal.id)
        })
    }

    fn list_goals(&self, user: &UserContext) -> Result<Vec<GoalView>, PaisaError> {
        let conn = self.conn()?;
        let goals = load_goals(&conn, user.user_id)?;
        Ok(goals.into_iter().map(GoalView::from).collect())
    }
}

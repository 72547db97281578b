//! Savings goals.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::error::PaisaError;
use crate::domain::goals::{FinancialGoal, GoalView, NewGoal};
use crate::domain::user::UserContext;

pub trait GoalPort {
    fn create_goal(
        &self,
        user: &UserContext,
        goal: &NewGoal,
        today: NaiveDate,
    ) -> Result<FinancialGoal, PaisaError>;

    fn contribute(
        &self,
        user: &UserContext,
        goal_id: i64,
        amount: Decimal,
    ) -> Result<FinancialGoal, PaisaError>;

    /// Newest first.
    fn list_goals(&self, user: &UserContext) -> Result<Vec<GoalView>, PaisaError>;
}

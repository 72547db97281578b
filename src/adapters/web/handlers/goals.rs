//! Savings goals.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use super::{current_user, parse_date, parse_decimal, today};
use crate::adapters::web::AppState;
use crate::adapters::web::auth::AuthSession;
use crate::adapters::web::error::WebError;
use crate::domain::error::PaisaError;
use crate::domain::goals::{FinancialGoal, GoalType, GoalView, NewGoal};

#[derive(Debug, Deserialize)]
pub struct GoalForm {
    pub title: String,
    pub goal_type: String,
    pub target_amount: String,
    pub target_date: String,
}

#[derive(Debug, Deserialize)]
pub struct ContributionForm {
    pub amount: String,
}

impl TryFrom<GoalForm> for NewGoal {
    type Error = PaisaError;

    fn try_from(form: GoalForm) -> Result<Self, Self::Error> {
        Ok(NewGoal {
            title: form.title.trim().to_string(),
            goal_type: GoalType::from_str(form.goal_type.trim())?,
            target_amount: parse_decimal("target_amount", &form.target_amount)?,
            target_date: parse_date("target_date", &form.target_date)?,
        })
    }
}

pub async fn goals(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Vec<GoalView>>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.list_goals(&user)?))
}

pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Form(form): Form<GoalForm>,
) -> Result<(StatusCode, Json<FinancialGoal>), WebError> {
    let user = current_user(&auth)?;
    let goal = NewGoal::try_from(form)?;
    Ok((
        StatusCode::CREATED,
        Json(state.store.create_goal(&user, &goal, today())?),
    ))
}

pub async fn contribute(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(goal_id): Path<i64>,
    Form(form): Form<ContributionForm>,
) -> Result<Json<FinancialGoal>, WebError> {
    let user = current_user(&auth)?;
    let amount = parse_decimal("amount", &form.amount)?;
    Ok(Json(state.store.contribute(&user, goal_id, amount)?))
}

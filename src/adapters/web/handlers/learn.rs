//! Learning modules, quizzes and fraud-spotting scenarios.

use axum::{
    Form, Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use super::current_user;
use crate::adapters::web::AppState;
use crate::adapters::web::auth::AuthSession;
use crate::adapters::web::error::WebError;
use crate::domain::error::PaisaError;
use crate::domain::progress::{
    AnswerOption, FraudOutcome, ModuleCompletion, ModuleDetail, ModuleListing, QuizResult,
    ScenarioDetail, ScenarioListing,
};

#[derive(Debug, Deserialize)]
pub struct FraudForm {
    pub user_response: String,
}

pub fn parse_answers(raw: HashMap<i64, String>) -> Result<HashMap<i64, AnswerOption>, PaisaError> {
    raw.into_iter()
        .map(|(question_id, answer)| Ok((question_id, AnswerOption::from_str(&answer)?)))
        .collect()
}

pub async fn modules(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Vec<ModuleListing>>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.list_modules(&user)?))
}

pub async fn module(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(module_id): Path<i64>,
) -> Result<Json<ModuleDetail>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.open_module(&user, module_id)?))
}

pub async fn complete_module(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(module_id): Path<i64>,
) -> Result<Json<ModuleCompletion>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(
        state.store.complete_module(&user, module_id, Utc::now())?,
    ))
}

pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(module_id): Path<i64>,
    Json(answers): Json<HashMap<i64, String>>,
) -> Result<Json<QuizResult>, WebError> {
    let user = current_user(&auth)?;
    let answers = parse_answers(answers)?;
    Ok(Json(
        state
            .store
            .submit_quiz(&user, module_id, &answers, Utc::now())?,
    ))
}

pub async fn scenarios(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Vec<ScenarioListing>>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.list_scenarios(&user)?))
}

pub async fn scenario(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(scenario_id): Path<i64>,
) -> Result<Json<ScenarioDetail>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.open_scenario(&user, scenario_id)?))
}

pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(scenario_id): Path<i64>,
    Form(form): Form<FraudForm>,
) -> Result<Json<FraudOutcome>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.submit_fraud_response(
        &user,
        scenario_id,
        &form.user_response,
        Utc::now(),
    )?))
}

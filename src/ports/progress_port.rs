//! Learning progress, quizzes and fraud scenarios.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::error::PaisaError;
use crate::domain::progress::{
    AnswerOption, FraudOutcome, ModuleCompletion, ModuleDetail, ModuleListing, QuizResult,
    ScenarioDetail, ScenarioListing,
};
use crate::domain::user::UserContext;

pub trait ProgressPort {
    fn list_modules(&self, user: &UserContext) -> Result<Vec<ModuleListing>, PaisaError>;

    /// Creates the progress row on first visit.
    fn open_module(&self, user: &UserContext, module_id: i64) -> Result<ModuleDetail, PaisaError>;

    /// Idempotent: only the first call awards anything.
    fn complete_module(
        &self,
        user: &UserContext,
        module_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ModuleCompletion, PaisaError>;

    fn submit_quiz(
        &self,
        user: &UserContext,
        module_id: i64,
        answers: &HashMap<i64, AnswerOption>,
        now: DateTime<Utc>,
    ) -> Result<QuizResult, PaisaError>;

    fn list_scenarios(&self, user: &UserContext) -> Result<Vec<ScenarioListing>, PaisaError>;

    fn open_scenario(&self, user: &UserContext, scenario_id: i64)
    -> Result<ScenarioDetail, PaisaError>;

    /// One attempt per scenario; later submissions return the first.
    fn submit_fraud_response(
        &self,
        user: &UserContext,
        scenario_id: i64,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<FraudOutcome, PaisaError>;
}

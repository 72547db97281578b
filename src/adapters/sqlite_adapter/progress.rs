//! Learning modules, quizzes, fraud scenarios and the rewards they grant.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;

use super::{
    SqliteStore, conversion_err, enum_col, opt_timestamp_col, query_err, tokens, ts, users,
};
use crate::domain::error::PaisaError;
use crate::domain::progress::{
    AnswerOption, Award, FraudOutcome, FraudScenario, LearningModule, ModuleCompletion,
    ModuleDetail, ModuleListing, Quiz, QuizQuestion, QuizResult, ScenarioDetail, ScenarioListing,
    UserFraudProgress, UserProgress, grade_response, score_quiz, validate_fraud_response,
};
use crate::domain::tokens::TokenEntry;
use crate::domain::user::UserContext;
use crate::ports::progress_port::ProgressPort;

const MODULE_COLUMNS: &str = "id, title, description, content, difficulty_level, points_reward,
     token_reward, estimated_time, is_active, sort_order";

const SCENARIO_COLUMNS: &str = "id, title, description, scenario_content, fraud_type, red_flags,
     correct_action, points_reward, token_reward, difficulty_level, is_active";

fn module_from_row(row: &Row<'_>) -> rusqlite::Result<LearningModule> {
    Ok(LearningModule {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        difficulty_level: enum_col(row, 4)?,
        points_reward: row.get(5)?,
        token_reward: row.get(6)?,
        estimated_time: row.get(7)?,
        is_active: row.get(8)?,
        order: row.get(9)?,
    })
}

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<FraudScenario> {
    let raw_flags: String = row.get(5)?;
    Ok(FraudScenario {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        scenario_content: row.get(3)?,
        fraud_type: enum_col(row, 4)?,
        red_flags: serde_json::from_str(&raw_flags).map_err(|e| conversion_err(5, e))?,
        correct_action: row.get(6)?,
        points_reward: row.get(7)?,
        token_reward: row.get(8)?,
        difficulty_level: enum_col(row, 9)?,
        is_active: row.get(10)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<UserProgress> {
    Ok(UserProgress {
        user_id: row.get(0)?,
        module_id: row.get(1)?,
        is_completed: row.get(2)?,
        completion_date: opt_timestamp_col(row, 3)?,
        quiz_score: row.get(4)?,
        quiz_passed: row.get(5)?,
        time_spent: row.get(6)?,
    })
}

fn fraud_progress_from_row(row: &Row<'_>) -> rusqlite::Result<UserFraudProgress> {
    Ok(UserFraudProgress {
        user_id: row.get(0)?,
        scenario_id: row.get(1)?,
        user_response: row.get(2)?,
        is_correct: row.get(3)?,
        is_completed: row.get(4)?,
        completion_date: opt_timestamp_col(row, 5)?,
    })
}

fn load_active_module(conn: &Connection, module_id: i64) -> Result<LearningModule, PaisaError> {
    conn.query_row(
        &format!("SELECT {MODULE_COLUMNS} FROM learning_modules WHERE id = ?1 AND is_active = 1"),
        params![module_id],
        module_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("module", module_id))
}

fn load_quiz(conn: &Connection, module_id: i64) -> Result<Option<Quiz>, PaisaError> {
    let header = conn
        .query_row(
            "SELECT id, module_id, title, passing_score FROM quizzes WHERE module_id = ?1",
            params![module_id],
            |row| {
                Ok(Quiz {
                    id: row.get(0)?,
                    module_id: row.get(1)?,
                    title: row.get(2)?,
                    passing_score: row.get(3)?,
                    questions: Vec::new(),
                })
            },
        )
        .optional()
        .map_err(query_err)?;
    let Some(mut quiz) = header else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            "SELECT id, question_text, option_a, option_b, option_c, option_d, correct_answer,
                    explanation
             FROM quiz_questions WHERE quiz_id = ?1 ORDER BY id",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![quiz.id], |row| {
            Ok(QuizQuestion {
                id: row.get(0)?,
                question_text: row.get(1)?,
                option_a: row.get(2)?,
                option_b: row.get(3)?,
                option_c: row.get(4)?,
                option_d: row.get(5)?,
                correct_answer: enum_col(row, 6)?,
                explanation: row.get(7)?,
            })
        })
        .map_err(query_err)?;
    quiz.questions = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(query_err)?;
    Ok(Some(quiz))
}

/// Fetch the user's progress row for a module, creating it if needed.
fn ensure_progress(
    conn: &Connection,
    user_id: i64,
    module_id: i64,
) -> Result<UserProgress, PaisaError> {
    conn.execute(
        "INSERT OR IGNORE INTO user_progress (user_id, module_id) VALUES (?1, ?2)",
        params![user_id, module_id],
    )
    .map_err(query_err)?;
    conn.query_row(
        "SELECT user_id, module_id, is_completed, completion_date, quiz_score, quiz_passed,
                time_spent
         FROM user_progress WHERE user_id = ?1 AND module_id = ?2",
        params![user_id, module_id],
        progress_from_row,
    )
    .map_err(query_err)
}

/// Credit `award` to the profile and the token log.
fn grant(
    conn: &Connection,
    user_id: i64,
    award: Award,
    description: &str,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<(), PaisaError> {
    if award.points > 0 {
        users::add_points(conn, user_id, award.points)?;
    }
    if award.tokens > 0 {
        let entry = TokenEntry::earn(award.tokens, description, reference);
        tokens::append_token(conn, user_id, &entry, now)?;
    }
    Ok(())
}

/// Mark a module complete once, crediting its rewards the first time.
fn complete(
    conn: &Connection,
    user_id: i64,
    module: &LearningModule,
    now: DateTime<Utc>,
) -> Result<ModuleCompletion, PaisaError> {
    let progress = ensure_progress(conn, user_id, module.id)?;
    if progress.is_completed {
        return Ok(ModuleCompletion {
            progress,
            newly_completed: false,
            award: Award::default(),
        });
    }

    conn.execute(
        "UPDATE user_progress SET is_completed = 1, completion_date = ?1
         WHERE user_id = ?2 AND module_id = ?3",
        params![ts(now), user_id, module.id],
    )
    .map_err(query_err)?;
    let award = Award {
        points: module.points_reward,
        tokens: module.token_reward,
    };
    grant(
        conn,
        user_id,
        award,
        &format!("Completed module: {}", module.title),
        &format!("module:{}", module.id),
        now,
    )?;

    Ok(ModuleCompletion {
        progress: ensure_progress(conn, user_id, module.id)?,
        newly_completed: true,
        award,
    })
}

fn load_active_scenario(conn: &Connection, scenario_id: i64) -> Result<FraudScenario, PaisaError> {
    conn.query_row(
        &format!(
            "SELECT {SCENARIO_COLUMNS} FROM fraud_scenarios WHERE id = ?1 AND is_active = 1"
        ),
        params![scenario_id],
        scenario_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("scenario", scenario_id))
}

fn load_fraud_progress(
    conn: &Connection,
    user_id: i64,
    scenario_id: i64,
) -> Result<Option<UserFraudProgress>, PaisaError> {
    conn.query_row(
        "SELECT user_id, scenario_id, user_response, is_correct, is_completed, completion_date
         FROM user_fraud_progress WHERE user_id = ?1 AND scenario_id = ?2",
        params![user_id, scenario_id],
        fraud_progress_from_row,
    )
    .optional()
    .map_err(query_err)
}

impl ProgressPort for SqliteStore {
    fn list_modules(&self, user: &UserContext) -> Result<Vec<ModuleListing>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MODULE_COLUMNS},
                        COALESCE((SELECT is_completed FROM user_progress p
                                  WHERE p.module_id = m.id AND p.user_id = ?1), 0)
                 FROM learning_modules m WHERE is_active = 1
                 ORDER BY sort_order, title, id"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user.user_id], |row| {
                Ok(ModuleListing {
                    module: module_from_row(row)?,
                    is_completed: row.get(10)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn open_module(&self, user: &UserContext, module_id: i64) -> Result<ModuleDetail, PaisaError> {
        self.write(|tx| {
            let module = load_active_module(tx, module_id)?;
            let quiz = load_quiz(tx, module.id)?;
            let progress = ensure_progress(tx, user.user_id, module.id)?;
            Ok(ModuleDetail {
                module,
                quiz,
                progress,
            })
        })
    }

    fn complete_module(
        &self,
        user: &UserContext,
        module_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ModuleCompletion, PaisaError> {
        self.write(|tx| {
            let module = load_active_module(tx, module_id)?;
            complete(tx, user.user_id, &module, now)
        })
    }

    fn submit_quiz(
        &self,
        user: &UserContext,
        module_id: i64,
        answers: &HashMap<i64, AnswerOption>,
        now: DateTime<Utc>,
    ) -> Result<QuizResult, PaisaError> {
        let rewards = self.options().quiz_rewards;
        self.write(|tx| {
            let module = load_active_module(tx, module_id)?;
            let quiz = load_quiz(tx, module.id)?
                .ok_or_else(|| PaisaError::not_found("quiz", module.id))?;
            let score = score_quiz(&quiz.questions, answers, quiz.passing_score);
            let progress = ensure_progress(tx, user.user_id, module.id)?;

            tx.execute(
                "UPDATE user_progress SET quiz_score = ?1 WHERE user_id = ?2 AND module_id = ?3",
                params![score.percentage, user.user_id, module.id],
            )
            .map_err(query_err)?;

            let mut award = Award::default();
            if score.passed && !progress.quiz_passed {
                tx.execute(
                    "UPDATE user_progress SET quiz_passed = 1 WHERE user_id = ?1 AND module_id = ?2",
                    params![user.user_id, module.id],
                )
                .map_err(query_err)?;
                let quiz_award = Award {
                    points: rewards.points_per_quiz,
                    tokens: rewards.tokens_for(&score),
                };
                grant(
                    tx,
                    user.user_id,
                    quiz_award,
                    &format!("Passed quiz: {}", quiz.title),
                    &format!("quiz:{}", quiz.id),
                    now,
                )?;
                award = quiz_award + complete(tx, user.user_id, &module, now)?.award;
            }

            Ok(QuizResult::new(&score, award))
        })
    }

    fn list_scenarios(&self, user: &UserContext) -> Result<Vec<ScenarioListing>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SCENARIO_COLUMNS},
                        COALESCE(p.is_completed, 0), COALESCE(p.is_correct, 0)
                 FROM fraud_scenarios s
                 LEFT JOIN user_fraud_progress p ON p.scenario_id = s.id AND p.user_id = ?1
                 WHERE s.is_active = 1
                 ORDER BY s.id"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user.user_id], |row| {
                Ok(ScenarioListing {
                    scenario: scenario_from_row(row)?,
                    is_completed: row.get(11)?,
                    is_correct: row.get(12)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn open_scenario(
        &self,
        user: &UserContext,
        scenario_id: i64,
    ) -> Result<ScenarioDetail, PaisaError> {
        let conn = self.conn()?;
        let scenario = load_active_scenario(&conn, scenario_id)?;
        let progress = load_fraud_progress(&conn, user.user_id, scenario.id)?;
        Ok(ScenarioDetail::new(scenario, progress))
    }

    fn submit_fraud_response(
        &self,
        user: &UserContext,
        scenario_id: i64,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<FraudOutcome, PaisaError> {
        validate_fraud_response(response)?;
        let response = response.trim();

        self.write(|tx| {
            let scenario = load_active_scenario(tx, scenario_id)?;
            if let Some(progress) = load_fraud_progress(tx, user.user_id, scenario.id)? {
                return Ok(FraudOutcome {
                    progress,
                    already_completed: true,
                    award: Award::default(),
                    correct_action: scenario.correct_action,
                });
            }

            let is_correct = grade_response(&scenario.red_flags, response);
            tx.execute(
                "INSERT INTO user_fraud_progress (user_id, scenario_id, user_response, is_correct,
                     is_completed, completion_date)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![user.user_id, scenario.id, response, is_correct, ts(now)],
            )
            .map_err(query_err)?;

            let award = if is_correct {
                Award {
                    points: scenario.points_reward,
                    tokens: scenario.token_reward,
                }
            } else {
                Award::default()
            };
            grant(
                tx,
                user.user_id,
                award,
                &format!("Spotted fraud: {}", scenario.title),
                &format!("fraud:{}", scenario.id),
                now,
            )?;

            let progress = load_fraud_progress(tx, user.user_id, scenario.id)?
                .ok_or_else(|| PaisaError::not_found("scenario progress", scenario.id))?;
            Ok(FraudOutcome {
                progress,
                already_completed: false,
                award,
                correct_action: scenario.correct_action,
            })
        })
    }
}

//! Bulk content loading.

use rusqlite::params;

use super::{SqliteStore, money, query_err, ts};
use crate::domain::content::{ContentBundle, ContentSummary};
use crate::domain::error::PaisaError;
use crate::ports::content_port::ContentPort;

impl ContentPort for SqliteStore {
    fn load_content(&self, bundle: &ContentBundle) -> Result<ContentSummary, PaisaError> {
        bundle.validate()?;

        self.write(|tx| {
            let mut summary = ContentSummary::default();

            for entry in &bundle.modules {
                let m = &entry.module;
                tx.execute(
                    "INSERT INTO learning_modules (title, description, content, difficulty_level,
                         points_reward, token_reward, estimated_time, is_active, sort_order)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        m.title.trim(),
                        m.description,
                        m.content,
                        m.difficulty_level.as_str(),
                        m.points_reward,
                        m.token_reward,
                        m.estimated_time,
                        m.is_active,
                        m.order,
                    ],
                )
                .map_err(query_err)?;
                let module_id = tx.last_insert_rowid();
                summary.modules += 1;

                let Some(quiz) = &entry.quiz else {
                    continue;
                };
                tx.execute(
                    "INSERT INTO quizzes (module_id, title, passing_score) VALUES (?1, ?2, ?3)",
                    params![module_id, quiz.title, quiz.passing_score],
                )
                .map_err(query_err)?;
                let quiz_id = tx.last_insert_rowid();
                for q in &quiz.questions {
                    tx.execute(
                        "INSERT INTO quiz_questions (quiz_id, question_text, option_a, option_b,
                             option_c, option_d, correct_answer, explanation)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            quiz_id,
                            q.question_text,
                            q.option_a,
                            q.option_b,
                            q.option_c,
                            q.option_d,
                            q.correct_answer.as_str(),
                            q.explanation,
                        ],
                    )
                    .map_err(query_err)?;
                    summary.questions += 1;
                }
            }

            for s in &bundle.scenarios {
                let red_flags = serde_json::to_string(&s.red_flags).map_err(|e| {
                    PaisaError::Internal {
                        reason: format!("encoding red flags: {e}"),
                    }
                })?;
                tx.execute(
                    "INSERT INTO fraud_scenarios (title, description, scenario_content, fraud_type,
                         red_flags, correct_action, points_reward, token_reward,
                         difficulty_level, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        s.title.trim(),
                        s.description,
                        s.scenario_content,
                        s.fraud_type.as_str(),
                        red_flags,
                        s.correct_action,
                        s.points_reward,
                        s.token_reward,
                        s.difficulty_level.as_str(),
                        s.is_active,
                    ],
                )
                .map_err(query_err)?;
                summary.scenarios += 1;
            }

            for c in &bundle.coupons {
                tx.execute(
                    "INSERT INTO coupons (title, description, brand, code_prefix, token_cost,
                         stock, used, status, valid_until)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        c.title,
                        c.description,
                        c.brand,
                        c.code_prefix.trim(),
                        c.token_cost,
                        c.stock,
                        c.used,
                        c.status.as_str(),
                        ts(c.valid_until),
                    ],
                )
                .map_err(query_err)?;
                summary.coupons += 1;
            }

            for p in &bundle.packages {
                tx.execute(
                    "INSERT INTO token_packages (name, tokens, price, is_active)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![p.name, p.tokens, money(p.price), p.is_active],
                )
                .map_err(query_err)?;
                summary.packages += 1;
            }

            Ok(summary)
        })
    }
}

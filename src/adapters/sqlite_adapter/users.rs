//! Accounts, profiles, leaderboard and dashboard queries.

use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{
    SqliteStore, budget, decimal_col, enum_col, goals, ledger, money, query_err, timestamp_col,
    tokens, ts, write_err,
};
use crate::domain::analysis::{first_of_month, last_of_month};
use crate::domain::error::PaisaError;
use crate::domain::portfolio::PortfolioSummary;
use crate::domain::user::{
    Dashboard, Leaderboard, LeaderboardEntry, NewUser, ProfileUpdate, SiteStats, User,
    UserContext, UserProfile, UserStats, completion_rate, hash_password, normalize_phone,
    verify_password,
};
use crate::ports::user_port::UserPort;

const USER_COLUMNS: &str = "id, username, email, phone_number, password_hash, first_name, last_name,
     age, occupation, monthly_income, financial_experience, created_at, updated_at";

const DASHBOARD_TRANSACTIONS: usize = 5;
const DASHBOARD_GOALS: usize = 3;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        password_hash: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        age: row.get(7)?,
        occupation: row.get(8)?,
        monthly_income: decimal_col(row, 9)?,
        financial_experience: enum_col(row, 10)?,
        created_at: timestamp_col(row, 11)?,
        updated_at: timestamp_col(row, 12)?,
    })
}

pub(super) fn load_user(conn: &Connection, user_id: i64) -> Result<User, PaisaError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        user_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("user", user_id))
}

pub(super) fn load_profile(conn: &Connection, user_id: i64) -> Result<UserProfile, PaisaError> {
    conn.query_row(
        "SELECT user_id, total_points, level, streak_days, last_activity
         FROM user_profiles WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(UserProfile {
                user_id: row.get(0)?,
                total_points: row.get(1)?,
                level: row.get(2)?,
                streak_days: row.get(3)?,
                last_activity: timestamp_col(row, 4)?,
            })
        },
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("profile", user_id))
}

/// Credit points to a profile inside the caller's transaction.
pub(super) fn add_points(conn: &Connection, user_id: i64, points: i64) -> Result<(), PaisaError> {
    let changed = conn
        .execute(
            "UPDATE user_profiles SET total_points = total_points + ?1, last_activity = ?2
             WHERE user_id = ?3",
            params![points, ts(Utc::now()), user_id],
        )
        .map_err(query_err)?;
    if changed == 0 {
        return Err(PaisaError::not_found("profile", user_id));
    }
    Ok(())
}

fn count(conn: &Connection, sql: &str, user_id: Option<i64>) -> Result<i64, PaisaError> {
    match user_id {
        Some(id) => conn.query_row(sql, params![id], |r| r.get(0)),
        None => conn.query_row(sql, [], |r| r.get(0)),
    }
    .map_err(query_err)
}

fn active_modules(conn: &Connection) -> Result<i64, PaisaError> {
    count(conn, "SELECT COUNT(*) FROM learning_modules WHERE is_active = 1", None)
}

fn completed_modules(conn: &Connection, user_id: i64) -> Result<i64, PaisaError> {
    count(
        conn,
        "SELECT COUNT(*) FROM user_progress p
         JOIN learning_modules m ON m.id = p.module_id
         WHERE p.user_id = ?1 AND p.is_completed = 1 AND m.is_active = 1",
        Some(user_id),
    )
}

impl UserPort for SqliteStore {
    fn register(&self, new_user: &NewUser, password: &str) -> Result<User, PaisaError> {
        new_user.validate(password)?;
        let password_hash = hash_password(password)?;
        let now = ts(Utc::now());
        let initial_cash = money(self.options.initial_cash);

        self.write(|tx| {
            tx.execute(
                "INSERT INTO users (username, email, phone_number, password_hash, first_name,
                     last_name, age, occupation, monthly_income, financial_experience,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    new_user.username,
                    new_user.email.trim(),
                    normalize_phone(new_user.phone_number.as_deref()),
                    password_hash,
                    new_user.first_name.trim(),
                    new_user.last_name.trim(),
                    new_user.age,
                    new_user.occupation.trim(),
                    money(new_user.monthly_income),
                    new_user.financial_experience.as_str(),
                    now,
                ],
            )
            .map_err(write_err)?;
            let user_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO user_profiles (user_id, last_activity) VALUES (?1, ?2)",
                params![user_id, now],
            )
            .map_err(query_err)?;
            tx.execute(
                "INSERT INTO portfolios (user_id, virtual_cash, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, initial_cash, now],
            )
            .map_err(query_err)?;
            load_user(tx, user_id)
        })
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, PaisaError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()
            .map_err(query_err)?;
        Ok(user.filter(|u| verify_password(&u.password_hash, password)))
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>, PaisaError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()
        .map_err(query_err)
    }

    fn update_profile(
        &self,
        user: &UserContext,
        update: &ProfileUpdate,
    ) -> Result<User, PaisaError> {
        update.validate()?;
        self.write(|tx| {
            let changed = tx
                .execute(
                    "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3,
                         phone_number = ?4, age = ?5, occupation = ?6, monthly_income = ?7,
                         financial_experience = ?8, updated_at = ?9
                     WHERE id = ?10",
                    params![
                        update.first_name.trim(),
                        update.last_name.trim(),
                        update.email.trim(),
                        normalize_phone(update.phone_number.as_deref()),
                        update.age,
                        update.occupation.trim(),
                        money(update.monthly_income),
                        update.financial_experience.as_str(),
                        ts(Utc::now()),
                        user.user_id,
                    ],
                )
                .map_err(write_err)?;
            if changed == 0 {
                return Err(PaisaError::not_found("user", user.user_id));
            }
            load_user(tx, user.user_id)
        })
    }

    fn profile(&self, user: &UserContext) -> Result<UserProfile, PaisaError> {
        let conn = self.conn()?;
        load_profile(&conn, user.user_id)
    }

    fn leaderboard(&self, user: &UserContext, limit: usize) -> Result<Leaderboard, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT u.username, p.total_points, p.level
                 FROM user_profiles p JOIN users u ON u.id = p.user_id
                 ORDER BY p.total_points DESC, u.username ASC
                 LIMIT ?1",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(query_err)?;

        let mut top_users = Vec::new();
        for (i, row) in rows.enumerate() {
            let (username, total_points, level) = row.map_err(query_err)?;
            top_users.push(LeaderboardEntry {
                rank: i + 1,
                username,
                total_points,
                level,
            });
        }

        let profile = load_profile(&conn, user.user_id)?;
        let ahead: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM user_profiles WHERE total_points > ?1",
                params![profile.total_points],
                |r| r.get(0),
            )
            .map_err(query_err)?;

        Ok(Leaderboard {
            top_users,
            user_rank: ahead + 1,
            user_points: profile.total_points,
        })
    }

    fn user_stats(&self, user: &UserContext) -> Result<UserStats, PaisaError> {
        let conn = self.conn()?;
        let profile = load_profile(&conn, user.user_id)?;
        let modules_completed = completed_modules(&conn, user.user_id)?;
        let total_modules = active_modules(&conn)?;
        let scenarios_completed = count(
            &conn,
            "SELECT COUNT(*) FROM user_fraud_progress WHERE user_id = ?1 AND is_completed = 1",
            Some(user.user_id),
        )?;
        let total_scenarios = count(
            &conn,
            "SELECT COUNT(*) FROM fraud_scenarios WHERE is_active = 1",
            None,
        )?;
        Ok(UserStats {
            total_points: profile.total_points,
            level: profile.level,
            streak_days: profile.streak_days,
            modules_completed,
            total_modules,
            scenarios_completed,
            total_scenarios,
            completion_rate: completion_rate(modules_completed, total_modules),
        })
    }

    fn dashboard(&self, user: &UserContext, today: NaiveDate) -> Result<Dashboard, PaisaError> {
        let conn = self.conn()?;
        let profile = load_profile(&conn, user.user_id)?;
        let portfolio = ledger::load_portfolio(&conn, user.user_id)?;
        let recent_transactions =
            ledger::recent_transactions(&conn, portfolio.id, DASHBOARD_TRANSACTIONS)?;
        let completed = completed_modules(&conn, user.user_id)?;
        let total = active_modules(&conn)?;
        let active_goals = goals::load_goals(&conn, user.user_id)?
            .into_iter()
            .filter(|g| !g.is_achieved)
            .take(DASHBOARD_GOALS)
            .collect();
        let month_expenses = budget::load_expenses_between(
            &conn,
            user.user_id,
            first_of_month(today.year(), today.month()),
            last_of_month(today.year(), today.month()),
        )?;

        Ok(Dashboard {
            profile,
            portfolio: PortfolioSummary::from(&portfolio),
            completed_modules: completed,
            total_modules: total,
            progress_percentage: completion_rate(completed, total),
            recent_transactions,
            active_goals,
            monthly_expenses: crate::domain::money::sum(month_expenses.iter().map(|e| e.amount))?,
            token_balance: tokens::token_account(&conn, user.user_id)?.balance,
        })
    }

    fn site_stats(&self) -> Result<SiteStats, PaisaError> {
        let conn = self.conn()?;
        Ok(SiteStats {
            total_users: count(&conn, "SELECT COUNT(*) FROM users", None)?,
            total_modules: active_modules(&conn)?,
            total_scenarios: count(
                &conn,
                "SELECT COUNT(*) FROM fraud_scenarios WHERE is_active = 1",
                None,
            )?,
        })
    }
}

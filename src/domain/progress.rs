//! Learning modules, quizzes and fraud-awareness scenarios, plus the
//! scoring rules that decide what a user earns from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::PaisaError;

pub const DEFAULT_PASSING_SCORE: i64 = 70;
pub const MIN_FRAUD_RESPONSE: usize = 50;
pub const MAX_FRAUD_RESPONSE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(PaisaError::validation(
                "difficulty_level",
                format!("unknown difficulty '{other}'"),
            )),
        }
    }
}

fn default_points() -> i64 {
    10
}

fn default_module_tokens() -> i64 {
    50
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningModule {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub difficulty_level: Difficulty,
    #[serde(default = "default_points")]
    pub points_reward: i64,
    #[serde(default = "default_module_tokens")]
    pub token_reward: i64,
    /// Minutes.
    #[serde(default)]
    pub estimated_time: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerOption {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(AnswerOption::A),
            "B" | "b" => Ok(AnswerOption::B),
            "C" | "c" => Ok(AnswerOption::C),
            "D" | "d" => Ok(AnswerOption::D),
            other => Err(PaisaError::validation(
                "answer",
                format!("expected A, B, C or D, got '{other}'"),
            )),
        }
    }
}

/// Answers are never serialized back out; only content files carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: i64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    #[serde(skip_serializing)]
    pub correct_answer: AnswerOption,
    #[serde(default, skip_serializing)]
    pub explanation: String,
}

fn default_passing_score() -> i64 {
    DEFAULT_PASSING_SCORE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub module_id: i64,
    pub title: String,
    #[serde(default = "default_passing_score")]
    pub passing_score: i64,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub user_id: i64,
    pub module_id: i64,
    pub is_completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub quiz_score: Option<f64>,
    pub quiz_passed: bool,
    pub time_spent: i64,
}

impl UserProgress {
    pub fn new(user_id: i64, module_id: i64) -> Self {
        Self {
            user_id,
            module_id,
            is_completed: false,
            completion_date: None,
            quiz_score: None,
            quiz_passed: false,
            time_spent: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleListing {
    pub module: LearningModule,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDetail {
    pub module: LearningModule,
    pub quiz: Option<Quiz>,
    pub progress: UserProgress,
}

/// Points and tokens credited by one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Award {
    pub points: i64,
    pub tokens: i64,
}

impl Award {
    pub fn is_empty(&self) -> bool {
        self.points == 0 && self.tokens == 0
    }
}

impl std::ops::Add for Award {
    type Output = Award;

    fn add(self, rhs: Award) -> Award {
        Award {
            points: self.points + rhs.points,
            tokens: self.tokens + rhs.tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleCompletion {
    pub progress: UserProgress,
    pub newly_completed: bool,
    pub award: Award,
}

/// Reward table for passing quizzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizRewards {
    pub points_per_quiz: i64,
    pub tokens_pass: i64,
    pub tokens_high: i64,
    pub tokens_perfect: i64,
}

impl Default for QuizRewards {
    fn default() -> Self {
        Self {
            points_per_quiz: 20,
            tokens_pass: 10,
            tokens_high: 15,
            tokens_perfect: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuizScore {
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub passed: bool,
}

impl QuizScore {
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }

    /// At or above `threshold` percent, compared without float rounding.
    pub fn reaches(&self, threshold: i64) -> bool {
        self.total > 0 && self.score * 100 >= threshold * self.total
    }
}

pub fn score_quiz(
    questions: &[QuizQuestion],
    answers: &HashMap<i64, AnswerOption>,
    passing_score: i64,
) -> QuizScore {
    let total = questions.len() as i64;
    let score = questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_answer))
        .count() as i64;
    let percentage = if total > 0 {
        score as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let mut result = QuizScore {
        score,
        total,
        percentage,
        passed: false,
    };
    result.passed = result.reaches(passing_score);
    result
}

impl QuizRewards {
    /// Tokens for a passing attempt: perfect, then high (90%+), then pass.
    pub fn tokens_for(&self, score: &QuizScore) -> i64 {
        if score.is_perfect() {
            self.tokens_perfect
        } else if score.reaches(90) {
            self.tokens_high
        } else {
            self.tokens_pass
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResult {
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub passed: bool,
    pub points_earned: i64,
    pub tokens_earned: i64,
}

impl QuizResult {
    pub fn new(score: &QuizScore, award: Award) -> Self {
        Self {
            score: score.score,
            total: score.total,
            percentage: score.percentage,
            passed: score.passed,
            points_earned: award.points,
            tokens_earned: award.tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudType {
    Phishing,
    UpiFraud,
    FakeInvestment,
    IdentityTheft,
    LotteryScam,
}

impl FraudType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudType::Phishing => "phishing",
            FraudType::UpiFraud => "upi_fraud",
            FraudType::FakeInvestment => "fake_investment",
            FraudType::IdentityTheft => "identity_theft",
            FraudType::LotteryScam => "lottery_scam",
        }
    }
}

impl FromStr for FraudType {
    type Err = PaisaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phishing" => Ok(FraudType::Phishing),
            "upi_fraud" => Ok(FraudType::UpiFraud),
            "fake_investment" => Ok(FraudType::FakeInvestment),
            "identity_theft" => Ok(FraudType::IdentityTheft),
            "lottery_scam" => Ok(FraudType::LotteryScam),
            other => Err(PaisaError::validation(
                "fraud_type",
                format!("unknown fraud type '{other}'"),
            )),
        }
    }
}

fn default_fraud_points() -> i64 {
    15
}

fn default_fraud_tokens() -> i64 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudScenario {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub scenario_content: String,
    pub fraud_type: FraudType,
    #[serde(skip_serializing)]
    pub red_flags: Vec<String>,
    #[serde(skip_serializing)]
    pub correct_action: String,
    #[serde(default = "default_fraud_points")]
    pub points_reward: i64,
    #[serde(default = "default_fraud_tokens")]
    pub token_reward: i64,
    #[serde(default)]
    pub difficulty_level: Difficulty,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserFraudProgress {
    pub user_id: i64,
    pub scenario_id: i64,
    pub user_response: String,
    pub is_correct: bool,
    pub is_completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioListing {
    pub scenario: FraudScenario,
    pub is_completed: bool,
    pub is_correct: bool,
}

/// A scenario as shown to the user. The red flags and correct action are
/// only revealed once the user has answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioDetail {
    pub scenario: FraudScenario,
    pub progress: Option<UserFraudProgress>,
    pub red_flags: Option<Vec<String>>,
    pub correct_action: Option<String>,
}

impl ScenarioDetail {
    pub fn new(scenario: FraudScenario, progress: Option<UserFraudProgress>) -> Self {
        let (red_flags, correct_action) = match progress {
            Some(_) => (
                Some(scenario.red_flags.clone()),
                Some(scenario.correct_action.clone()),
            ),
            None => (None, None),
        };
        Self {
            scenario,
            progress,
            red_flags,
            correct_action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudOutcome {
    pub progress: UserFraudProgress,
    pub already_completed: bool,
    pub award: Award,
    pub correct_action: String,
}

pub fn validate_fraud_response(response: &str) -> Result<(), PaisaError> {
    let len = response.trim().chars().count();
    if len < MIN_FRAUD_RESPONSE {
        return Err(PaisaError::validation(
            "user_response",
            format!("must be at least {MIN_FRAUD_RESPONSE} characters"),
        ));
    }
    if len > MAX_FRAUD_RESPONSE {
        return Err(PaisaError::validation(
            "user_response",
            format!("must be at most {MAX_FRAUD_RESPONSE} characters"),
        ));
    }
    Ok(())
}

/// Count the red flags mentioned in `response`, case-insensitively.
pub fn red_flags_found(red_flags: &[String], response: &str) -> usize {
    let haystack = response.to_lowercase();
    red_flags
        .iter()
        .filter(|flag| haystack.contains(&flag.to_lowercase()))
        .count()
}

/// Correct when at least 60% of the red flags are mentioned.
pub fn grade_response(red_flags: &[String], response: &str) -> bool {
    red_flags_found(red_flags, response) * 10 >= red_flags.len() * 6
}

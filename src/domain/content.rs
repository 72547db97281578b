//! Reference content loaded from a JSON bundle: learning modules with their
//! quizzes, fraud scenarios, coupons and token packages.

use serde::Deserialize;
use std::path::Path;

use super::error::PaisaError;
use super::money::{AMOUNT_DIGITS, check_money};
use super::progress::{FraudScenario, LearningModule, Quiz};
use super::tokens::{Coupon, TokenPackage};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleContent {
    #[serde(flatten)]
    pub module: LearningModule,
    #[serde(default)]
    pub quiz: Option<Quiz>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ContentBundle {
    #[serde(default)]
    pub modules: Vec<ModuleContent>,
    #[serde(default)]
    pub scenarios: Vec<FraudScenario>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
    #[serde(default)]
    pub packages: Vec<TokenPackage>,
}

/// Row counts written by a content load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentSummary {
    pub modules: usize,
    pub questions: usize,
    pub scenarios: usize,
    pub coupons: usize,
    pub packages: usize,
}

impl ContentBundle {
    pub fn from_json(json: &str) -> Result<Self, PaisaError> {
        let bundle: ContentBundle =
            serde_json::from_str(json).map_err(|e| PaisaError::validation("content", e.to_string()))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PaisaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), PaisaError> {
        for entry in &self.modules {
            let m = &entry.module;
            if m.title.trim().is_empty() {
                return Err(PaisaError::validation("modules", "module title cannot be empty"));
            }
            if m.points_reward < 0 || m.token_reward < 0 {
                return Err(PaisaError::validation(
                    "modules",
                    format!("rewards for '{}' cannot be negative", m.title),
                ));
            }
            if let Some(quiz) = &entry.quiz {
                if !(0..=100).contains(&quiz.passing_score) {
                    return Err(PaisaError::validation(
                        "quiz",
                        format!("passing score for '{}' must be 0-100", quiz.title),
                    ));
                }
            }
        }
        for s in &self.scenarios {
            if s.title.trim().is_empty() {
                return Err(PaisaError::validation("scenarios", "scenario title cannot be empty"));
            }
            if s.points_reward < 0 || s.token_reward < 0 {
                return Err(PaisaError::validation(
                    "scenarios",
                    format!("rewards for '{}' cannot be negative", s.title),
                ));
            }
        }
        for c in &self.coupons {
            if c.code_prefix.trim().is_empty() {
                return Err(PaisaError::validation(
                    "coupons",
                    format!("coupon '{}' needs a code prefix", c.title),
                ));
            }
            if c.token_cost <= 0 || c.stock < 0 {
                return Err(PaisaError::validation(
                    "coupons",
                    format!("coupon '{}' needs a positive cost and non-negative stock", c.title),
                ));
            }
        }
        for p in &self.packages {
            if p.tokens <= 0 || p.price.is_sign_negative() {
                return Err(PaisaError::validation(
                    "packages",
                    format!("package '{}' needs positive tokens and a non-negative price", p.name),
                ));
            }
            check_money("packages", p.price, AMOUNT_DIGITS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::AnswerOption;

    const BUNDLE: &str = r#"{
        "modules": [
            {
                "title": "Budgeting Basics",
                "description": "Plan your month",
                "content": "50/30/20",
                "estimated_time": 15,
                "order": 1,
                "quiz": {
                    "title": "Budget quiz",
                    "questions": [
                        {"question_text": "Needs share?", "option_a": "50%", "option_b": "30%",
                         "option_c": "20%", "option_d": "10%", "correct_answer": "A"}
                    ]
                }
            }
        ],
        "scenarios": [
            {"title": "KYC call", "scenario_content": "Bank asks for OTP",
             "fraud_type": "phishing", "red_flags": ["otp", "urgent"],
             "correct_action": "Hang up"}
        ],
        "coupons": [
            {"title": "Coffee", "code_prefix": "CAFE", "token_cost": 30, "stock": 10,
             "status": "active", "valid_until": "2030-01-01T00:00:00Z"}
        ],
        "packages": [
            {"name": "Starter", "tokens": 100, "price": "49.00"}
        ]
    }"#;

    #[test]
    fn parses_full_bundle_with_defaults() {
        let bundle = ContentBundle::from_json(BUNDLE).unwrap();
        assert_eq!(bundle.modules.len(), 1);
        let module = &bundle.modules[0];
        assert_eq!(module.module.points_reward, 10);
        let quiz = module.quiz.as_ref().unwrap();
        assert_eq!(quiz.passing_score, 70);
        assert_eq!(quiz.questions[0].correct_answer, AnswerOption::A);
        assert_eq!(bundle.scenarios[0].points_reward, 15);
        assert_eq!(bundle.scenarios[0].token_reward, 20);
        assert_eq!(bundle.coupons[0].used, 0);
        assert!(bundle.packages[0].is_active);
    }

    #[test]
    fn empty_object_is_an_empty_bundle() {
        assert_eq!(ContentBundle::from_json("{}").unwrap(), ContentBundle::default());
    }

    #[test]
    fn rejects_zero_cost_coupon() {
        let json = r#"{"coupons": [{"title": "Free", "code_prefix": "F", "token_cost": 0,
            "stock": 1, "status": "active", "valid_until": "2030-01-01T00:00:00Z"}]}"#;
        assert!(ContentBundle::from_json(json).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ContentBundle::from_json("{\"modules\": 3}"),
            Err(PaisaError::Validation { .. })
        ));
    }
}

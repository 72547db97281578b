//! End-to-end flows across the store: onboarding, learning and rewards,
//! trading, budgeting and goals.

mod common;

use approx::assert_relative_eq;
use chrono::{NaiveDate, Utc};
use common::*;
use paisabuddy::adapters::sqlite_adapter::SqliteStore;
use paisabuddy::domain::budget::{NewBudget, NewCategory, NewExpense};
use paisabuddy::domain::error::PaisaError;
use paisabuddy::domain::execution::TradeOrder;
use paisabuddy::domain::goals::{GoalType, NewGoal};
use paisabuddy::domain::portfolio::TransactionType;
use paisabuddy::domain::progress::AnswerOption;
use paisabuddy::domain::tokens::UserCouponStatus;
use paisabuddy::domain::user::UserContext;
use paisabuddy::ports::budget_port::BudgetPort;
use paisabuddy::ports::goal_port::GoalPort;
use paisabuddy::ports::ledger_port::LedgerPort;
use paisabuddy::ports::progress_port::ProgressPort;
use paisabuddy::ports::token_port::TokenPort;
use paisabuddy::ports::user_port::UserPort;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

mod onboarding {
    use super::*;

    #[test]
    fn new_user_starts_with_cash_and_no_tokens() {
        let store = store();
        let user = register(&store, "asha");

        let dashboard = store.dashboard(&user, today()).unwrap();
        assert_eq!(dashboard.portfolio.virtual_cash, dec!(100000.00));
        assert_eq!(dashboard.token_balance, 0);
        assert_eq!(dashboard.profile.total_points, 0);
        assert!(dashboard.recent_transactions.is_empty());
        assert_eq!(dashboard.monthly_expenses, dec!(0));

        let stats = store.site_stats().unwrap();
        assert_eq!(stats.total_users, 1);
    }

    #[test]
    fn duplicate_username_is_reported_by_field() {
        let store = store();
        register(&store, "asha");
        let mut again = new_user("asha");
        again.email = "other@example.com".into();
        let err = store.register(&again, PASSWORD).unwrap_err();
        assert!(matches!(err, PaisaError::Duplicate { ref field } if field == "username"));
    }

    #[test]
    fn authenticate_checks_password() {
        let store = store();
        register(&store, "asha");
        assert!(store.authenticate("asha", PASSWORD).unwrap().is_some());
        assert!(store.authenticate("asha", "wrong-pass1").unwrap().is_none());
        assert!(store.authenticate("nobody", PASSWORD).unwrap().is_none());
    }
}

mod learning_and_rewards {
    use super::*;

    fn perfect_answers(
        store: &SqliteStore,
        user: &UserContext,
        module_id: i64,
    ) -> HashMap<i64, AnswerOption> {
        let detail = store.open_module(user, module_id).unwrap();
        let questions = detail.quiz.unwrap().questions;
        assert_eq!(questions.len(), 2);
        HashMap::from([
            (questions[0].id, AnswerOption::A),
            (questions[1].id, AnswerOption::C),
        ])
    }

    #[test]
    fn quiz_tokens_buy_a_coupon() {
        let store = store();
        load_content(&store);
        let user = register(&store, "asha");

        let module_id = store.list_modules(&user).unwrap()[0].module.id;
        let answers = perfect_answers(&store, &user, module_id);
        let result = store.submit_quiz(&user, module_id, &answers, Utc::now()).unwrap();
        assert!(result.passed);
        assert_relative_eq!(result.percentage, 100.0);
        // Quiz reward plus the module completion reward.
        assert_eq!(result.points_earned, 30);
        assert_eq!(result.tokens_earned, 75);

        let stats = store.user_stats(&user).unwrap();
        assert_eq!(stats.total_points, 30);
        assert_eq!(stats.modules_completed, 1);
        assert_relative_eq!(stats.completion_rate, 100.0);

        let coupon = store.list_coupons(Utc::now()).unwrap().remove(0);
        let purchase = store.purchase_coupon(&user, coupon.id, Utc::now()).unwrap();
        assert_eq!(purchase.new_balance, 45);
        assert!(purchase.user_coupon.code.starts_with("CAFE"));

        let account = store.token_account(&user).unwrap();
        assert_eq!(account.balance, 45);
        assert_eq!(account.total_earned, 75);
        assert_eq!(account.total_spent, 30);

        let redeemed = store
            .redeem_user_coupon(&user, purchase.user_coupon.id, Utc::now())
            .unwrap();
        assert_eq!(redeemed.status, UserCouponStatus::Redeemed);
    }

    #[test]
    fn retaking_a_passed_quiz_awards_nothing() {
        let store = store();
        load_content(&store);
        let user = register(&store, "asha");
        let module_id = store.list_modules(&user).unwrap()[0].module.id;
        let answers = perfect_answers(&store, &user, module_id);

        store.submit_quiz(&user, module_id, &answers, Utc::now()).unwrap();
        let again = store.submit_quiz(&user, module_id, &answers, Utc::now()).unwrap();
        assert!(again.passed);
        assert_eq!(again.points_earned, 0);
        assert_eq!(again.tokens_earned, 0);
        assert_eq!(store.token_account(&user).unwrap().balance, 75);
    }

    #[test]
    fn failing_quiz_keeps_module_open() {
        let store = store();
        load_content(&store);
        let user = register(&store, "asha");
        let module_id = store.list_modules(&user).unwrap()[0].module.id;
        let answers: HashMap<i64, AnswerOption> = perfect_answers(&store, &user, module_id)
            .into_keys()
            .map(|id| (id, AnswerOption::D))
            .collect();

        let result = store.submit_quiz(&user, module_id, &answers, Utc::now()).unwrap();
        assert!(!result.passed);
        assert_eq!(result.tokens_earned, 0);
        assert!(!store.list_modules(&user).unwrap()[0].is_completed);
    }

    #[test]
    fn spotting_fraud_pays_once() {
        let store = store();
        load_content(&store);
        let user = register(&store, "asha");
        let scenario_id = store.list_scenarios(&user).unwrap()[0].scenario.id;

        let before = store.open_scenario(&user, scenario_id).unwrap();
        assert!(before.red_flags.is_none());

        let response = "The caller wanted my OTP and sounded urgent, so I hung up on them.";
        let outcome = store
            .submit_fraud_response(&user, scenario_id, response, Utc::now())
            .unwrap();
        assert!(outcome.progress.is_correct);
        assert_eq!(outcome.award.tokens, 20);

        let again = store
            .submit_fraud_response(&user, scenario_id, response, Utc::now())
            .unwrap();
        assert!(again.already_completed);
        assert_eq!(store.token_account(&user).unwrap().balance, 20);

        let after = store.open_scenario(&user, scenario_id).unwrap();
        assert_eq!(after.red_flags.unwrap().len(), 3);
    }

    #[test]
    fn coupon_needs_enough_tokens() {
        let store = store();
        load_content(&store);
        let user = register(&store, "asha");
        let coupon = store.list_coupons(Utc::now()).unwrap().remove(0);

        let err = store.purchase_coupon(&user, coupon.id, Utc::now()).unwrap_err();
        assert!(matches!(err, PaisaError::InsufficientTokens { required: 30, available: 0 }));
        assert!(store.list_user_coupons(&user).unwrap().is_empty());
        assert!(store.token_history(&user, 10).unwrap().is_empty());
    }
}

mod trading {
    use super::*;

    #[test]
    fn buy_then_sell_after_price_move() {
        let store = store();
        let user = register(&store, "asha");
        store.upsert_stocks(&[listing("INFY", dec!(100))]).unwrap();
        let stock = find_stock(&store, "INFY");

        let buy = TradeOrder {
            transaction_type: TransactionType::Buy,
            stock_id: stock.id,
            quantity: 10,
        };
        let receipt = store.execute_trade(&user, &buy).unwrap();
        assert_eq!(receipt.portfolio.virtual_cash, dec!(99000));
        assert_eq!(receipt.holding.as_ref().unwrap().average_price, dec!(100));

        store.upsert_stocks(&[listing("INFY", dec!(120))]).unwrap();
        let sell = TradeOrder {
            transaction_type: TransactionType::Sell,
            stock_id: stock.id,
            quantity: 5,
        };
        let receipt = store.execute_trade(&user, &sell).unwrap();
        assert_eq!(receipt.portfolio.virtual_cash, dec!(99600));
        assert_eq!(receipt.portfolio.total_invested, dec!(500));
        assert_eq!(receipt.holding.as_ref().unwrap().quantity, 5);

        let view = store.revalue_portfolio(&user).unwrap();
        assert_eq!(view.portfolio.current_value, dec!(600));
        assert_eq!(view.portfolio.profit_loss, dec!(100));
        assert_eq!(view.recent_transactions.len(), 2);
        assert_eq!(
            view.recent_transactions[0].transaction_type,
            TransactionType::Sell
        );

        let summary = store.portfolio_summary(&user).unwrap();
        assert_eq!(summary.profit_loss_percent, dec!(20));
    }

    #[test]
    fn overselling_is_rejected() {
        let store = store();
        let user = register(&store, "asha");
        store.upsert_stocks(&[listing("TCS", dec!(50))]).unwrap();
        let stock = find_stock(&store, "TCS");

        let sell = TradeOrder {
            transaction_type: TransactionType::Sell,
            stock_id: stock.id,
            quantity: 1,
        };
        let err = store.execute_trade(&user, &sell).unwrap_err();
        assert!(matches!(err, PaisaError::InsufficientShares { requested: 1, available: 0 }));
        assert_eq!(
            store.portfolio_summary(&user).unwrap().virtual_cash,
            dec!(100000.00)
        );
    }

    #[test]
    fn portfolios_are_private() {
        let store = store();
        let asha = register(&store, "asha");
        let ravi = register(&store, "ravi");
        store.upsert_stocks(&[listing("INFY", dec!(100))]).unwrap();
        let stock = find_stock(&store, "INFY");
        let buy = TradeOrder {
            transaction_type: TransactionType::Buy,
            stock_id: stock.id,
            quantity: 1,
        };
        store.execute_trade(&asha, &buy).unwrap();

        assert!(store.revalue_portfolio(&ravi).unwrap().holdings.is_empty());
        assert_eq!(store.revalue_portfolio(&asha).unwrap().holdings.len(), 1);
    }
}

mod budgeting {
    use super::*;

    #[test]
    fn expenses_roll_into_budget_and_dashboard() {
        let store = store();
        let user = register(&store, "asha");
        let today = today();
        let start = today;
        let budget = NewBudget {
            name: "This month".into(),
            total_amount: dec!(15000),
            start_date: start,
            end_date: start + chrono::Duration::days(30),
            categories: vec![
                NewCategory {
                    name: "Food".into(),
                    allocated_amount: dec!(5000),
                },
                NewCategory {
                    name: "Travel".into(),
                    allocated_amount: dec!(2000),
                },
            ],
        };
        let overview = store.create_budget(&user, &budget, today).unwrap();
        let food = overview.categories[0].category.id;

        store
            .add_expense(
                &user,
                &NewExpense {
                    description: "Groceries".into(),
                    amount: dec!(1200),
                    date: today,
                    category_id: Some(food),
                    is_recurring: false,
                },
            )
            .unwrap();

        let budgets = store.list_budgets(&user).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].spent_amount, dec!(1200));
        assert_eq!(budgets[0].categories[0].remaining, dec!(3800));

        let dashboard = store.dashboard(&user, today).unwrap();
        assert_eq!(dashboard.monthly_expenses, dec!(1200));

        let recent = store.recent_expenses(&user, 20).unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn default_categories_fill_an_empty_budget() {
        let store = store();
        let user = register(&store, "asha");
        let today = today();
        let budget = NewBudget {
            name: "Defaults".into(),
            total_amount: dec!(10000),
            start_date: today,
            end_date: today + chrono::Duration::days(10),
            categories: vec![],
        };
        let overview = store.create_budget(&user, &budget, today).unwrap();
        assert_eq!(overview.categories.len(), 8);
        assert_eq!(overview.categories[0].category.name, "Food & Dining");
    }

    #[test]
    fn expense_in_foreign_category_is_rejected() {
        let store = store();
        let asha = register(&store, "asha");
        let ravi = register(&store, "ravi");
        let today = today();
        let overview = store
            .create_budget(
                &asha,
                &NewBudget {
                    name: "Mine".into(),
                    total_amount: dec!(1000),
                    start_date: today,
                    end_date: today + chrono::Duration::days(5),
                    categories: vec![],
                },
                today,
            )
            .unwrap();

        let err = store
            .add_expense(
                &ravi,
                &NewExpense {
                    description: "Sneaky".into(),
                    amount: dec!(10),
                    date: today,
                    category_id: Some(overview.categories[0].category.id),
                    is_recurring: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, PaisaError::NotFound { .. }));
    }
}

mod goals {
    use super::*;

    #[test]
    fn achieved_goal_leaves_dashboard() {
        let store = store();
        let user = register(&store, "asha");
        let today = today();
        let goal = store
            .create_goal(
                &user,
                &NewGoal {
                    title: "Phone".into(),
                    goal_type: GoalType::Gadget,
                    target_amount: dec!(1000),
                    target_date: today + chrono::Duration::days(60),
                },
                today,
            )
            .unwrap();
        assert_eq!(store.dashboard(&user, today).unwrap().active_goals.len(), 1);

        store.contribute(&user, goal.id, dec!(400)).unwrap();
        let done = store.contribute(&user, goal.id, dec!(600)).unwrap();
        assert!(done.is_achieved);

        let views = store.list_goals(&user).unwrap();
        assert_eq!(views[0].progress_percentage, dec!(100));
        assert!(store.dashboard(&user, today).unwrap().active_goals.is_empty());

        let err = store.contribute(&user, goal.id, dec!(1)).unwrap_err();
        assert!(matches!(err, PaisaError::InvalidAmount { .. }));
    }
}

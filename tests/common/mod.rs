#![allow(dead_code)]

use paisabuddy::adapters::sqlite_adapter::SqliteStore;
use paisabuddy::domain::stock::{Stock, StockListing};
use paisabuddy::domain::user::{FinancialExperience, NewUser, UserContext};
use paisabuddy::ports::content_port::ContentPort;
use paisabuddy::ports::ledger_port::LedgerPort;
use paisabuddy::ports::user_port::UserPort;
use rust_decimal::Decimal;
use std::io::Write;

pub const PASSWORD: &str = "paisa-pass1";

/// One module with a two-question quiz (answers A then C), one phishing
/// scenario, a 30-token coupon valid until 2099 and one token package.
pub const CONTENT_JSON: &str = r#"{
    "modules": [
        {
            "title": "Budgeting Basics",
            "description": "Plan your month",
            "content": "Needs, wants, savings.",
            "estimated_time": 10,
            "order": 1,
            "quiz": {
                "title": "Budget check",
                "questions": [
                    {"question_text": "Share for needs?", "option_a": "50%", "option_b": "30%",
                     "option_c": "20%", "option_d": "10%", "correct_answer": "A"},
                    {"question_text": "Share for savings?", "option_a": "50%", "option_b": "30%",
                     "option_c": "20%", "option_d": "10%", "correct_answer": "C"}
                ]
            }
        }
    ],
    "scenarios": [
        {"title": "Fake KYC call", "scenario_content": "A caller from your bank asks for the OTP.",
         "fraud_type": "phishing", "red_flags": ["otp", "urgent", "caller"],
         "correct_action": "Hang up and call the bank yourself"}
    ],
    "coupons": [
        {"title": "Coffee voucher", "code_prefix": "CAFE", "token_cost": 30, "stock": 5,
         "status": "active", "valid_until": "2099-01-01T00:00:00Z"}
    ],
    "packages": [
        {"name": "Starter", "tokens": 100, "price": "49.00"}
    ]
}"#;

pub fn store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.initialize_schema().unwrap();
    store
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
        phone_number: None,
        age: Some(21),
        occupation: "student".to_string(),
        monthly_income: Decimal::from(20_000),
        financial_experience: FinancialExperience::Beginner,
    }
}

pub fn register(store: &SqliteStore, username: &str) -> UserContext {
    store.register(&new_user(username), PASSWORD).unwrap().context()
}

pub fn listing(symbol: &str, price: Decimal) -> StockListing {
    StockListing {
        symbol: symbol.to_string(),
        company_name: format!("{symbol} Ltd"),
        sector: "IT".to_string(),
        current_price: price,
        previous_close: price,
        market_cap: None,
    }
}

/// Stocks by symbol, as the store assigned them.
pub fn find_stock(store: &SqliteStore, symbol: &str) -> Stock {
    store
        .list_stocks(Some(symbol), None)
        .unwrap()
        .stocks
        .into_iter()
        .find(|s| s.symbol == symbol)
        .unwrap()
}

pub fn load_content(store: &SqliteStore) {
    let bundle = paisabuddy::domain::content::ContentBundle::from_json(CONTENT_JSON).unwrap();
    store.load_content(&bundle).unwrap();
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

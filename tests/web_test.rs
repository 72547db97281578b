#![cfg(feature = "web")]
//! Router tests: session login flow, auth guard and the JSON handlers.

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::*;
use http_body_util::BodyExt;
use paisabuddy::adapters::web::{AppState, build_router};
use paisabuddy::domain::progress::QuizRewards;
use paisabuddy::domain::settings::{DEFAULT_CATEGORIES, Settings};
use paisabuddy::ports::ledger_port::LedgerPort;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;

fn settings() -> Settings {
    Settings {
        database_path: ":memory:".into(),
        pool_size: 1,
        listen: "127.0.0.1:0".into(),
        session_secret: Some("0123456789abcdef".repeat(8)),
        session_lifetime: 3600,
        secure_cookies: false,
        initial_cash: dec!(100000),
        quiz_rewards: QuizRewards::default(),
        default_categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Router over a store with content loaded and one stock (INFY at 100).
fn create_app() -> (Router, i64) {
    let store = store();
    load_content(&store);
    store.upsert_stocks(&[listing("INFY", dec!(100))]).unwrap();
    let stock_id = find_stock(&store, "INFY").id;
    let state = AppState {
        store: Arc::new(store),
        settings: settings(),
    };
    (build_router(state), stock_id)
}

fn extract_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

fn build_cookie_header(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .map(|sc| sc.split(';').next().unwrap_or("").to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn form_request(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

fn json_request(uri: &str, json: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn register_form(username: &str) -> String {
    format!(
        "username={username}&email={username}%40example.com&age=21&monthly_income=20000\
         &financial_experience=beginner&password1={PASSWORD}&password2={PASSWORD}"
    )
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {other}"),
    }
}

/// Registers `username` and returns the session cookie header.
async fn signed_up(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(form_request("/register", &register_form(username), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies = extract_cookies(&response);
    assert!(!cookies.is_empty(), "registration should start a session");
    build_cookie_header(&cookies)
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn protected_route_without_session_is_401() {
        let (app, _) = create_app();
        let response = app.oneshot(get_request("/dashboard", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn index_is_public() {
        let (app, _) = create_app();
        let response = app.oneshot(get_request("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["stats"]["total_modules"], 1);
        assert!(body["username"].is_null());
    }

    #[tokio::test]
    async fn register_logs_in() {
        let (app, _) = create_app();
        let cookie = signed_up(&app, "asha").await;

        let response = app
            .oneshot(get_request("/dashboard", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(decimal(&body["portfolio"]["virtual_cash"]), dec!(100000));
        assert_eq!(body["token_balance"], 0);
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords() {
        let (app, _) = create_app();
        let form = "username=asha&email=asha%40example.com&password1=paisa-pass1&password2=other-pass1";
        let response = app
            .oneshot(form_request("/register", form, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("password2"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_409() {
        let (app, _) = create_app();
        signed_up(&app, "asha").await;
        let response = app
            .oneshot(form_request("/register", &register_form("asha"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_401() {
        let (app, _) = create_app();
        signed_up(&app, "asha").await;
        let response = app
            .oneshot(form_request(
                "/login",
                "username=asha&password=wrong-pass1",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid username or password");
    }

    #[tokio::test]
    async fn login_then_logout() {
        let (app, _) = create_app();
        signed_up(&app, "asha").await;

        let response = app
            .clone()
            .oneshot(form_request(
                "/login",
                &format!("username=asha&password={PASSWORD}"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = build_cookie_header(&extract_cookies(&response));

        let response = app
            .clone()
            .oneshot(get_request("/api/user/stats", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(form_request("/logout", "", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get_request("/api/user/stats", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

mod handler_tests {
    use super::*;

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (app, _) = create_app();
        let response = app.oneshot(get_request("/nowhere", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn trade_and_portfolio() {
        let (app, stock_id) = create_app();
        let cookie = signed_up(&app, "asha").await;

        let response = app
            .clone()
            .oneshot(form_request(
                &format!("/portfolio/trade/{stock_id}"),
                "transaction_type=buy&quantity=10",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Successfully bought 10 shares of INFY");
        assert_eq!(decimal(&body["portfolio"]["virtual_cash"]), dec!(99000));

        let response = app
            .clone()
            .oneshot(form_request(
                &format!("/portfolio/trade/{stock_id}"),
                "transaction_type=sell&quantity=11",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(get_request("/portfolio", Some(&cookie)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["holdings"].as_array().unwrap().len(), 1);
        assert_eq!(body["holdings"][0]["quantity"], 10);
    }

    #[tokio::test]
    async fn stock_browser_and_quote() {
        let (app, stock_id) = create_app();
        let cookie = signed_up(&app, "asha").await;

        let response = app
            .clone()
            .oneshot(get_request("/portfolio/stocks?search=inf&page=abc", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 1);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/stock/{stock_id}/price"), Some(&cookie)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["symbol"], "INFY");

        let response = app
            .oneshot(get_request("/api/stock/9999/price", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn coupon_refusal_reports_success_false() {
        let (app, _) = create_app();
        let cookie = signed_up(&app, "asha").await;

        let response = app
            .clone()
            .oneshot(get_request("/coupons", Some(&cookie)))
            .await
            .unwrap();
        let coupons = body_json(response).await;
        let coupon_id = coupons[0]["id"].as_i64().unwrap();

        let response = app
            .oneshot(json_request(
                "/coupons/purchase",
                &format!("{{\"coupon_id\": {coupon_id}}}"),
                &cookie,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("insufficient tokens"));
    }

    #[tokio::test]
    async fn quiz_rewards_fund_a_coupon() {
        let (app, _) = create_app();
        let cookie = signed_up(&app, "asha").await;

        let response = app
            .clone()
            .oneshot(get_request("/learn", Some(&cookie)))
            .await
            .unwrap();
        let modules = body_json(response).await;
        let module_id = modules[0]["module"]["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(get_request(&format!("/learn/module/{module_id}"), Some(&cookie)))
            .await
            .unwrap();
        let detail = body_json(response).await;
        let questions = detail["quiz"]["questions"].as_array().unwrap();
        assert!(questions[0].get("correct_answer").is_none());
        let answers = format!(
            "{{\"{}\": \"a\", \"{}\": \"c\"}}",
            questions[0]["id"], questions[1]["id"]
        );

        let response = app
            .clone()
            .oneshot(json_request(
                &format!("/learn/module/{module_id}/quiz"),
                &answers,
                &cookie,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result = body_json(response).await;
        assert_eq!(result["passed"], true);
        assert_eq!(result["tokens_earned"], 75);

        let response = app
            .clone()
            .oneshot(get_request("/coupons", Some(&cookie)))
            .await
            .unwrap();
        let coupon_id = body_json(response).await[0]["id"].as_i64().unwrap();
        let response = app
            .clone()
            .oneshot(json_request(
                "/coupons/purchase",
                &format!("{{\"coupon_id\": {coupon_id}}}"),
                &cookie,
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["new_balance"], 45);
        assert!(body["coupon_code"].as_str().unwrap().starts_with("CAFE"));

        let response = app
            .oneshot(get_request("/tokens", Some(&cookie)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["account"]["balance"], 45);
        assert_eq!(body["history"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn goals_and_expenses_forms() {
        let (app, _) = create_app();
        let cookie = signed_up(&app, "asha").await;

        let response = app
            .clone()
            .oneshot(form_request(
                "/goals",
                "title=Laptop&goal_type=gadget&target_amount=50000&target_date=2099-12-31",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let goal_id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(form_request(
                &format!("/goals/{goal_id}/contribute"),
                "amount=60000",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .clone()
            .oneshot(form_request(
                "/expenses",
                "description=Lunch&amount=250&date=2024-01-15",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        for amount in ["250.555", "50000000000000000000000000000"] {
            let response = app
                .clone()
                .oneshot(form_request(
                    "/expenses",
                    &format!("description=Rent&amount={amount}&date=2024-01-16"),
                    Some(&cookie),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }

        let response = app
            .oneshot(get_request("/expenses", Some(&cookie)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["expenses"].as_array().unwrap().len(), 1);
        assert_eq!(body["monthly_totals"].as_array().unwrap().len(), 6);
    }
}

//! Token wallet, package shop and coupon marketplace.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::current_user;
use crate::adapters::web::AppState;
use crate::adapters::web::auth::AuthSession;
use crate::adapters::web::error::WebError;
use crate::domain::error::PaisaError;
use crate::domain::tokens::{Coupon, CouponPurchase, TokenPackage, UserCoupon};

pub const TOKEN_HISTORY: usize = 20;

#[derive(Debug, Deserialize)]
pub struct PackageRequest {
    pub package_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub coupon_id: i64,
}

/// Marketplace clients expect a `success` flag rather than an error status
/// when a purchase is refused.
pub fn purchase_outcome(result: Result<CouponPurchase, PaisaError>) -> Result<Value, WebError> {
    match result {
        Ok(purchase) => Ok(json!({
            "success": true,
            "coupon_code": purchase.user_coupon.code,
            "new_balance": purchase.new_balance,
        })),
        Err(e) if e.is_user_facing() => Ok(json!({ "success": false, "error": e.to_string() })),
        Err(e) => Err(WebError::from(e)),
    }
}

pub async fn tokens(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Value>, WebError> {
    let user = current_user(&auth)?;
    let account = state.store.token_account(&user)?;
    let history = state.store.token_history(&user, TOKEN_HISTORY)?;
    Ok(Json(json!({ "account": account, "history": history })))
}

pub async fn packages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TokenPackage>>, WebError> {
    Ok(Json(state.store.list_packages()?))
}

pub async fn purchase_package(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(request): Json<PackageRequest>,
) -> Result<Json<Value>, WebError> {
    let user = current_user(&auth)?;
    let transaction = state.store.purchase_package(&user, request.package_id)?;
    Ok(Json(json!({
        "success": true,
        "new_balance": transaction.balance_after,
        "transaction": transaction,
    })))
}

pub async fn coupons(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Coupon>>, WebError> {
    Ok(Json(state.store.list_coupons(Utc::now())?))
}

pub async fn my_coupons(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Vec<UserCoupon>>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.list_user_coupons(&user)?))
}

pub async fn purchase_coupon(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(request): Json<CouponRequest>,
) -> Result<Json<Value>, WebError> {
    let user = current_user(&auth)?;
    let result = state.store.purchase_coupon(&user, request.coupon_id, Utc::now());
    Ok(Json(purchase_outcome(result)?))
}

pub async fn redeem_coupon(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(user_coupon_id): Path<i64>,
) -> Result<Json<UserCoupon>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(
        state
            .store
            .redeem_user_coupon(&user, user_coupon_id, Utc::now())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn refused_purchase_is_reported_inline() {
        let body = purchase_outcome(Err(PaisaError::InsufficientTokens {
            required: 30,
            available: 10,
        }))
        .unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("insufficient tokens"));
    }

    #[test]
    fn internal_failure_is_an_error_status() {
        let err = purchase_outcome(Err(PaisaError::Database {
            reason: "disk full".into(),
        }))
        .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

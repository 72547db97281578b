//! Token ledger and coupon marketplace.

use chrono::{DateTime, Utc};

use crate::domain::error::PaisaError;
use crate::domain::tokens::{
    Coupon, CouponPurchase, TokenAccount, TokenPackage, TokenTransaction, UserCoupon,
};
use crate::domain::user::UserContext;

pub trait TokenPort {
    fn token_account(&self, user: &UserContext) -> Result<TokenAccount, PaisaError>;

    fn earn_tokens(
        &self,
        user: &UserContext,
        amount: i64,
        description: &str,
        reference: &str,
    ) -> Result<TokenTransaction, PaisaError>;

    fn spend_tokens(
        &self,
        user: &UserContext,
        amount: i64,
        description: &str,
        reference: &str,
    ) -> Result<TokenTransaction, PaisaError>;

    /// Newest first.
    fn token_history(
        &self,
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<TokenTransaction>, PaisaError>;

    fn purchase_package(
        &self,
        user: &UserContext,
        package_id: i64,
    ) -> Result<TokenTransaction, PaisaError>;

    fn purchase_coupon(
        &self,
        user: &UserContext,
        coupon_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CouponPurchase, PaisaError>;

    fn redeem_user_coupon(
        &self,
        user: &UserContext,
        user_coupon_id: i64,
        now: DateTime<Utc>,
    ) -> Result<UserCoupon, PaisaError>;

    /// Coupons a user could buy right now.
    fn list_coupons(&self, now: DateTime<Utc>) -> Result<Vec<Coupon>, PaisaError>;

    fn list_user_coupons(&self, user: &UserContext) -> Result<Vec<UserCoupon>, PaisaError>;

    fn list_packages(&self) -> Result<Vec<TokenPackage>, PaisaError>;
}

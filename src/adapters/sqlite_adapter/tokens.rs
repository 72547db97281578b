//! Token ledger, packages and the coupon marketplace.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{
    SqliteStore, decimal_col, enum_col, opt_timestamp_col, query_err, timestamp_col, ts,
    write_err,
};
use crate::domain::error::PaisaError;
use crate::domain::tokens::{
    COUPON_CODE_ATTEMPTS, Coupon, CouponPurchase, TokenAccount, TokenEntry, TokenPackage,
    TokenTransaction, UserCoupon, UserCouponStatus, check_coupon_purchase, generate_coupon_code,
};
use crate::domain::user::UserContext;
use crate::ports::token_port::TokenPort;

const COUPON_COLUMNS: &str = "id, title, description, brand, code_prefix, token_cost, stock, used,
     status, valid_until";

const USER_COUPON_COLUMNS: &str = "uc.id, uc.user_id, uc.coupon_id, c.title, uc.code, uc.status,
     uc.purchased_at, uc.redeemed_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<TokenTransaction> {
    Ok(TokenTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        balance_after: row.get(3)?,
        kind: enum_col(row, 4)?,
        description: row.get(5)?,
        reference: row.get(6)?,
        created_at: timestamp_col(row, 7)?,
    })
}

fn coupon_from_row(row: &Row<'_>) -> rusqlite::Result<Coupon> {
    Ok(Coupon {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        brand: row.get(3)?,
        code_prefix: row.get(4)?,
        token_cost: row.get(5)?,
        stock: row.get(6)?,
        used: row.get(7)?,
        status: enum_col(row, 8)?,
        valid_until: timestamp_col(row, 9)?,
    })
}

fn user_coupon_from_row(row: &Row<'_>) -> rusqlite::Result<UserCoupon> {
    Ok(UserCoupon {
        id: row.get(0)?,
        user_id: row.get(1)?,
        coupon_id: row.get(2)?,
        title: row.get(3)?,
        code: row.get(4)?,
        status: enum_col(row, 5)?,
        purchased_at: timestamp_col(row, 6)?,
        redeemed_at: opt_timestamp_col(row, 7)?,
    })
}

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<TokenPackage> {
    Ok(TokenPackage {
        id: row.get(0)?,
        name: row.get(1)?,
        tokens: row.get(2)?,
        price: decimal_col(row, 3)?,
        is_active: row.get(4)?,
    })
}

/// Balance and totals summed from the user's log.
pub(super) fn token_account(conn: &Connection, user_id: i64) -> Result<TokenAccount, PaisaError> {
    let mut stmt = conn
        .prepare("SELECT amount FROM token_transactions WHERE user_id = ?1")
        .map_err(query_err)?;
    let amounts = stmt
        .query_map(params![user_id], |row| row.get::<_, i64>(0))
        .map_err(query_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(query_err)?;
    Ok(TokenAccount::from_amounts(amounts))
}

/// Append `entry` to the log. Must run inside a write transaction so the
/// balance read and the insert see the same state.
pub(super) fn append_token(
    conn: &Connection,
    user_id: i64,
    entry: &TokenEntry,
    now: DateTime<Utc>,
) -> Result<TokenTransaction, PaisaError> {
    let balance = token_account(conn, user_id)?.balance;
    let balance_after = entry.apply_to(balance)?;
    conn.execute(
        "INSERT INTO token_transactions (user_id, amount, balance_after, kind, description,
             reference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            entry.amount,
            balance_after,
            entry.kind.as_str(),
            entry.description,
            entry.reference,
            ts(now),
        ],
    )
    .map_err(query_err)?;
    Ok(TokenTransaction {
        id: conn.last_insert_rowid(),
        user_id,
        amount: entry.amount,
        balance_after,
        kind: entry.kind,
        description: entry.description.clone(),
        reference: entry.reference.clone(),
        created_at: now,
    })
}

fn load_coupon(conn: &Connection, coupon_id: i64) -> Result<Coupon, PaisaError> {
    conn.query_row(
        &format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1"),
        params![coupon_id],
        coupon_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("coupon", coupon_id))
}

fn load_user_coupon(
    conn: &Connection,
    user_id: i64,
    user_coupon_id: i64,
) -> Result<UserCoupon, PaisaError> {
    conn.query_row(
        &format!(
            "SELECT {USER_COUPON_COLUMNS} FROM user_coupons uc JOIN coupons c ON c.id = uc.coupon_id
             WHERE uc.id = ?1 AND uc.user_id = ?2"
        ),
        params![user_coupon_id, user_id],
        user_coupon_from_row,
    )
    .optional()
    .map_err(query_err)?
    .ok_or_else(|| PaisaError::not_found("user coupon", user_coupon_id))
}

fn holds_active_copy(conn: &Connection, user_id: i64, coupon_id: i64) -> Result<bool, PaisaError> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM user_coupons
             WHERE user_id = ?1 AND coupon_id = ?2 AND status = 'active')",
        params![user_id, coupon_id],
        |row| row.get(0),
    )
    .map_err(query_err)
}

fn unique_code(conn: &Connection, prefix: &str) -> Result<String, PaisaError> {
    let mut rng = rand::thread_rng();
    for _ in 0..COUPON_CODE_ATTEMPTS {
        let code = generate_coupon_code(prefix, &mut rng);
        let taken: bool = conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM user_coupons WHERE code = ?1)",
                params![code],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        if !taken {
            return Ok(code);
        }
    }
    Err(PaisaError::Internal {
        reason: format!("no free coupon code for prefix {prefix}"),
    })
}

impl TokenPort for SqliteStore {
    fn token_account(&self, user: &UserContext) -> Result<TokenAccount, PaisaError> {
        let conn = self.conn()?;
        token_account(&conn, user.user_id)
    }

    fn earn_tokens(
        &self,
        user: &UserContext,
        amount: i64,
        description: &str,
        reference: &str,
    ) -> Result<TokenTransaction, PaisaError> {
        let entry = TokenEntry::earn(amount, description, reference);
        self.write(|tx| append_token(tx, user.user_id, &entry, Utc::now()))
    }

    fn spend_tokens(
        &self,
        user: &UserContext,
        amount: i64,
        description: &str,
        reference: &str,
    ) -> Result<TokenTransaction, PaisaError> {
        let entry = TokenEntry::spend(amount, description, reference);
        self.write(|tx| append_token(tx, user.user_id, &entry, Utc::now()))
    }

    fn token_history(
        &self,
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<TokenTransaction>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, amount, balance_after, kind, description, reference, created_at
                 FROM token_transactions WHERE user_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user.user_id, limit as i64], token_from_row)
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn purchase_package(
        &self,
        user: &UserContext,
        package_id: i64,
    ) -> Result<TokenTransaction, PaisaError> {
        self.write(|tx| {
            let package = tx
                .query_row(
                    "SELECT id, name, tokens, price, is_active FROM token_packages WHERE id = ?1",
                    params![package_id],
                    package_from_row,
                )
                .optional()
                .map_err(query_err)?
                .filter(|p| p.is_active)
                .ok_or_else(|| PaisaError::not_found("token package", package_id))?;
            let entry = TokenEntry::purchase(
                package.tokens,
                format!("Purchased {} package", package.name),
                format!("package:{}", package.id),
            );
            append_token(tx, user.user_id, &entry, Utc::now())
        })
    }

    fn purchase_coupon(
        &self,
        user: &UserContext,
        coupon_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CouponPurchase, PaisaError> {
        self.write(|tx| {
            let coupon = load_coupon(tx, coupon_id)?;
            let balance = token_account(tx, user.user_id)?.balance;
            let holds = holds_active_copy(tx, user.user_id, coupon.id)?;
            check_coupon_purchase(&coupon, balance, holds, now)?;

            let entry = TokenEntry::spend(
                coupon.token_cost,
                format!("Purchased coupon: {}", coupon.title),
                format!("coupon:{}", coupon.id),
            );
            let debit = append_token(tx, user.user_id, &entry, now)?;

            let code = unique_code(tx, &coupon.code_prefix)?;
            tx.execute(
                "INSERT INTO user_coupons (user_id, coupon_id, code, status, purchased_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.user_id,
                    coupon.id,
                    code,
                    UserCouponStatus::Active.as_str(),
                    ts(now)
                ],
            )
            .map_err(write_err)?;
            let user_coupon_id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE coupons SET used = used + 1 WHERE id = ?1",
                params![coupon.id],
            )
            .map_err(query_err)?;

            Ok(CouponPurchase {
                user_coupon: load_user_coupon(tx, user.user_id, user_coupon_id)?,
                new_balance: debit.balance_after,
            })
        })
    }

    fn redeem_user_coupon(
        &self,
        user: &UserContext,
        user_coupon_id: i64,
        now: DateTime<Utc>,
    ) -> Result<UserCoupon, PaisaError> {
        self.write(|tx| {
            let user_coupon = load_user_coupon(tx, user.user_id, user_coupon_id)?;
            if user_coupon.status == UserCouponStatus::Redeemed {
                return Err(PaisaError::AlreadyRedeemed);
            }
            tx.execute(
                "UPDATE user_coupons SET status = ?1, redeemed_at = ?2 WHERE id = ?3",
                params![
                    UserCouponStatus::Redeemed.as_str(),
                    ts(now),
                    user_coupon.id
                ],
            )
            .map_err(query_err)?;
            load_user_coupon(tx, user.user_id, user_coupon.id)
        })
    }

    fn list_coupons(&self, now: DateTime<Utc>) -> Result<Vec<Coupon>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY token_cost, title"
            ))
            .map_err(query_err)?;
        let rows = stmt.query_map([], coupon_from_row).map_err(query_err)?;
        let mut coupons = Vec::new();
        for row in rows {
            let coupon = row.map_err(query_err)?;
            if coupon.is_available(now) {
                coupons.push(coupon);
            }
        }
        Ok(coupons)
    }

    fn list_user_coupons(&self, user: &UserContext) -> Result<Vec<UserCoupon>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {USER_COUPON_COLUMNS} FROM user_coupons uc JOIN coupons c ON c.id = uc.coupon_id
                 WHERE uc.user_id = ?1 ORDER BY uc.purchased_at DESC, uc.id DESC"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user.user_id], user_coupon_from_row)
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn list_packages(&self) -> Result<Vec<TokenPackage>, PaisaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, tokens, price, is_active FROM token_packages
                 WHERE is_active = 1 ORDER BY tokens",
            )
            .map_err(query_err)?;
        let rows = stmt.query_map([], package_from_row).map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tokens::TokenKind;
    use crate::domain::user::{FinancialExperience, NewUser};
    use crate::ports::user_port::UserPort;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn setup() -> (SqliteStore, UserContext) {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        let user = register(&store, "saver");
        (store, user)
    }

    fn register(store: &SqliteStore, name: &str) -> UserContext {
        store
            .register(
                &NewUser {
                    username: name.into(),
                    email: format!("{name}@example.com"),
                    first_name: String::new(),
                    last_name: String::new(),
                    phone_number: None,
                    age: None,
                    occupation: String::new(),
                    monthly_income: Decimal::ZERO,
                    financial_experience: FinancialExperience::Beginner,
                },
                "paisa-pass1",
            )
            .unwrap()
            .context()
    }

    fn add_coupon(store: &SqliteStore, cost: i64, stock: i64, valid_until: DateTime<Utc>) -> i64 {
        let conn = store.conn().unwrap();
        conn.execute(
            "INSERT INTO coupons (title, code_prefix, token_cost, stock, status, valid_until)
             VALUES ('Coffee', 'CAFE', ?1, ?2, 'active', ?3)",
            params![cost, stock, ts(valid_until)],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn coupon_rows(store: &SqliteStore) -> i64 {
        store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM user_coupons", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn earn_then_buy_coupon() {
        let (store, user) = setup();
        let now = Utc::now();
        let coupon_id = add_coupon(&store, 30, 5, now + Duration::days(30));

        let earned = store.earn_tokens(&user, 50, "Module reward", "module:1").unwrap();
        assert_eq!(earned.balance_after, 50);
        let account = store.token_account(&user).unwrap();
        assert_eq!((account.balance, account.total_earned), (50, 50));

        let purchase = store.purchase_coupon(&user, coupon_id, now).unwrap();
        assert_eq!(purchase.new_balance, 20);
        assert!(purchase.user_coupon.code.starts_with("CAFE"));
        assert_eq!(purchase.user_coupon.code.len(), 8);
        assert_eq!(purchase.user_coupon.status, UserCouponStatus::Active);

        let account = store.token_account(&user).unwrap();
        assert_eq!((account.balance, account.total_spent), (20, 30));

        let history = store.token_history(&user, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TokenKind::Spend);
        assert_eq!(history[0].amount, -30);
        assert_eq!(history[0].balance_after, 20);
        assert_eq!(history[0].reference, format!("coupon:{coupon_id}"));
        assert_eq!(history[1].balance_after, 50);

        let conn = store.conn().unwrap();
        let used: i64 = conn
            .query_row("SELECT used FROM coupons WHERE id = ?1", params![coupon_id], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(used, 1);
    }

    #[test]
    fn coupon_rejections_leave_no_trace() {
        let (store, user) = setup();
        let now = Utc::now();
        let coupon_id = add_coupon(&store, 30, 1, now + Duration::days(1));

        assert!(matches!(
            store.purchase_coupon(&user, coupon_id, now),
            Err(PaisaError::InsufficientTokens { required: 30, available: 0 })
        ));

        store.earn_tokens(&user, 100, "gift", "").unwrap();
        store.purchase_coupon(&user, coupon_id, now).unwrap();
        assert!(matches!(
            store.purchase_coupon(&user, coupon_id, now),
            Err(PaisaError::CouponUnavailable)
        ));

        let other = add_coupon(&store, 10, 5, now - Duration::days(1));
        assert!(matches!(
            store.purchase_coupon(&user, other, now),
            Err(PaisaError::CouponUnavailable)
        ));

        assert_eq!(store.token_account(&user).unwrap().balance, 70);
        assert_eq!(coupon_rows(&store), 1);
    }

    #[test]
    fn duplicate_active_coupon_rejected_until_redeemed() {
        let (store, user) = setup();
        let now = Utc::now();
        let coupon_id = add_coupon(&store, 10, 5, now + Duration::days(1));
        store.earn_tokens(&user, 100, "gift", "").unwrap();

        let first = store.purchase_coupon(&user, coupon_id, now).unwrap();
        assert!(matches!(
            store.purchase_coupon(&user, coupon_id, now),
            Err(PaisaError::DuplicateCoupon)
        ));
        assert_eq!(store.token_account(&user).unwrap().balance, 90);

        let redeemed = store
            .redeem_user_coupon(&user, first.user_coupon.id, now)
            .unwrap();
        assert_eq!(redeemed.status, UserCouponStatus::Redeemed);
        assert!(redeemed.redeemed_at.is_some());
        assert!(matches!(
            store.redeem_user_coupon(&user, first.user_coupon.id, now),
            Err(PaisaError::AlreadyRedeemed)
        ));

        let second = store.purchase_coupon(&user, coupon_id, now).unwrap();
        assert_ne!(second.user_coupon.code, first.user_coupon.code);
        assert_eq!(store.list_user_coupons(&user).unwrap().len(), 2);
    }

    #[test]
    fn foreign_coupon_not_found() {
        let (store, user) = setup();
        let other = register(&store, "other");
        let now = Utc::now();
        let coupon_id = add_coupon(&store, 10, 5, now + Duration::days(1));
        store.earn_tokens(&user, 10, "gift", "").unwrap();
        let bought = store.purchase_coupon(&user, coupon_id, now).unwrap();

        assert!(matches!(
            store.redeem_user_coupon(&other, bought.user_coupon.id, now),
            Err(PaisaError::NotFound { .. })
        ));
        assert!(matches!(
            store.purchase_coupon(&user, 999, now),
            Err(PaisaError::NotFound { .. })
        ));
    }

    #[test]
    fn spend_and_earn_validation() {
        let (store, user) = setup();
        assert!(matches!(
            store.spend_tokens(&user, 5, "treat", ""),
            Err(PaisaError::InsufficientTokens { .. })
        ));
        assert!(matches!(
            store.earn_tokens(&user, 0, "nothing", ""),
            Err(PaisaError::InvalidAmount { .. })
        ));
        assert!(matches!(
            store.spend_tokens(&user, -5, "refund", ""),
            Err(PaisaError::InvalidAmount { .. })
        ));
        assert!(store.token_history(&user, 10).unwrap().is_empty());
    }

    #[test]
    fn packages_credit_tokens() {
        let (store, user) = setup();
        let conn = store.conn().unwrap();
        conn.execute(
            "INSERT INTO token_packages (name, tokens, price, is_active) VALUES ('Starter', 100, '49', 1)",
            [],
        )
        .unwrap();
        let active = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO token_packages (name, tokens, price, is_active) VALUES ('Retired', 10, '5', 0)",
            [],
        )
        .unwrap();
        let retired = conn.last_insert_rowid();
        drop(conn);

        assert_eq!(store.list_packages().unwrap().len(), 1);
        let credit = store.purchase_package(&user, active).unwrap();
        assert_eq!(credit.kind, TokenKind::Purchase);
        assert_eq!(credit.balance_after, 100);
        assert_eq!(credit.reference, format!("package:{active}"));
        assert!(matches!(
            store.purchase_package(&user, retired),
            Err(PaisaError::NotFound { .. })
        ));
    }

    #[test]
    fn list_coupons_hides_unavailable() {
        let (store, _) = setup();
        let now = Utc::now();
        add_coupon(&store, 10, 5, now + Duration::days(1));
        add_coupon(&store, 10, 0, now + Duration::days(1));
        add_coupon(&store, 10, 5, now - Duration::days(1));
        assert_eq!(store.list_coupons(now).unwrap().len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn balance_matches_signed_sum(ops in prop::collection::vec((any::<bool>(), 1i64..100), 1..20)) {
            let (store, user) = setup();
            let mut expected = 0i64;
            for (earn, amount) in ops {
                if earn {
                    store.earn_tokens(&user, amount, "earn", "").unwrap();
                    expected += amount;
                } else if store.spend_tokens(&user, amount, "spend", "").is_ok() {
                    expected -= amount;
                }
            }
            let account = store.token_account(&user).unwrap();
            prop_assert_eq!(account.balance, expected);
            prop_assert_eq!(account.total_earned - account.total_spent, expected);
            let history = store.token_history(&user, 100).unwrap();
            if let Some(latest) = history.first() {
                prop_assert_eq!(latest.balance_after, expected);
            }
        }
    }
}

//! Trade execution for the virtual ledger.
//!
//! Planning is pure: given the portfolio, the current holding and the fill
//! price it either rejects the order or returns every value the store must
//! write. The store applies a plan inside a single write transaction, so a
//! rejected order never touches the database.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::PaisaError;
use super::money;
use super::portfolio::{Holding, TransactionType, VirtualPortfolio, VirtualTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TradeOrder {
    pub transaction_type: TransactionType,
    pub stock_id: i64,
    pub quantity: i64,
}

/// Position values after a fill. `None` in [`TradePlan::holding_after`]
/// means the position was closed and its row must go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldingState {
    pub quantity: i64,
    pub average_price: Decimal,
    pub invested_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradePlan {
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub price_per_share: Decimal,
    pub total_amount: Decimal,
    pub cash_after: Decimal,
    pub total_invested_after: Decimal,
    pub holding_after: Option<HoldingState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReceipt {
    pub message: String,
    pub transaction: VirtualTransaction,
    pub portfolio: VirtualPortfolio,
    pub holding: Option<Holding>,
}

pub fn plan_trade(
    transaction_type: TransactionType,
    quantity: i64,
    price: Decimal,
    portfolio: &VirtualPortfolio,
    holding: Option<&Holding>,
) -> Result<TradePlan, PaisaError> {
    if quantity <= 0 {
        return Err(PaisaError::InvalidQuantity);
    }
    match transaction_type {
        TransactionType::Buy => plan_buy(quantity, price, portfolio, holding),
        TransactionType::Sell => plan_sell(quantity, price, portfolio, holding),
    }
}

fn plan_buy(
    quantity: i64,
    price: Decimal,
    portfolio: &VirtualPortfolio,
    holding: Option<&Holding>,
) -> Result<TradePlan, PaisaError> {
    let total_amount = money::mul(Decimal::from(quantity), price)?;
    if portfolio.virtual_cash < total_amount {
        return Err(PaisaError::InsufficientFunds {
            required: total_amount,
            available: portfolio.virtual_cash,
        });
    }

    let holding_after = match holding {
        Some(h) => {
            let new_quantity = h
                .quantity
                .checked_add(quantity)
                .ok_or(PaisaError::InvalidQuantity)?;
            let new_invested = money::add(h.invested_amount, total_amount)?;
            HoldingState {
                quantity: new_quantity,
                average_price: money::div(new_invested, Decimal::from(new_quantity))?,
                invested_amount: new_invested,
            }
        }
        None => HoldingState {
            quantity,
            average_price: price,
            invested_amount: total_amount,
        },
    };

    Ok(TradePlan {
        transaction_type: TransactionType::Buy,
        quantity,
        price_per_share: price,
        total_amount,
        cash_after: money::sub(portfolio.virtual_cash, total_amount)?,
        total_invested_after: money::add(portfolio.total_invested, total_amount)?,
        holding_after: Some(holding_after),
    })
}

fn plan_sell(
    quantity: i64,
    price: Decimal,
    portfolio: &VirtualPortfolio,
    holding: Option<&Holding>,
) -> Result<TradePlan, PaisaError> {
    let h = match holding {
        Some(h) if h.quantity >= quantity => h,
        other => {
            return Err(PaisaError::InsufficientShares {
                requested: quantity,
                available: other.map(|h| h.quantity).unwrap_or(0),
            });
        }
    };

    let total_amount = money::mul(Decimal::from(quantity), price)?;
    let remaining = h.quantity - quantity;

    // Cost basis leaving the position; a full close releases whatever is left
    // so rounding in the average never strands an invested remainder.
    let (released, holding_after) = if remaining == 0 {
        (h.invested_amount, None)
    } else {
        let released = money::mul(h.average_price, Decimal::from(quantity))?;
        (
            released,
            Some(HoldingState {
                quantity: remaining,
                average_price: h.average_price,
                invested_amount: money::sub(h.invested_amount, released)?,
            }),
        )
    };

    Ok(TradePlan {
        transaction_type: TransactionType::Sell,
        quantity,
        price_per_share: price,
        total_amount,
        cash_after: money::add(portfolio.virtual_cash, total_amount)?,
        total_invested_after: money::sub(portfolio.total_invested, released)?.max(Decimal::ZERO),
        holding_after,
    })
}

pub fn trade_message(transaction_type: TransactionType, quantity: i64, symbol: &str) -> String {
    match transaction_type {
        TransactionType::Buy => format!("Successfully bought {quantity} shares of {symbol}"),
        TransactionType::Sell => format!("Successfully sold {quantity} shares of {symbol}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn portfolio_with_cash(cash: Decimal) -> VirtualPortfolio {
        VirtualPortfolio {
            id: 1,
            user_id: 1,
            virtual_cash: cash,
            total_invested: Decimal::ZERO,
            current_value: Decimal::ZERO,
            profit_loss: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    fn holding_from(state: HoldingState) -> Holding {
        Holding {
            id: 1,
            portfolio_id: 1,
            stock_id: 1,
            symbol: "TCS".into(),
            quantity: state.quantity,
            average_price: state.average_price,
            invested_amount: state.invested_amount,
            current_value: Decimal::ZERO,
        }
    }

    fn apply(portfolio: &mut VirtualPortfolio, plan: &TradePlan) -> Option<Holding> {
        portfolio.virtual_cash = plan.cash_after;
        portfolio.total_invested = plan.total_invested_after;
        plan.holding_after.map(holding_from)
    }

    #[test]
    fn first_buy_creates_holding_at_trade_price() {
        let portfolio = portfolio_with_cash(dec!(100000));
        let plan = plan_trade(TransactionType::Buy, 10, dec!(100), &portfolio, None).unwrap();
        assert_eq!(plan.total_amount, dec!(1000));
        assert_eq!(plan.cash_after, dec!(99000));
        assert_eq!(plan.total_invested_after, dec!(1000));
        let h = plan.holding_after.unwrap();
        assert_eq!(h.quantity, 10);
        assert_eq!(h.average_price, dec!(100));
        assert_eq!(h.invested_amount, dec!(1000));
    }

    #[test]
    fn buy_then_partial_sell_scenario() {
        let mut portfolio = portfolio_with_cash(dec!(100000));
        let buy = plan_trade(TransactionType::Buy, 10, dec!(100), &portfolio, None).unwrap();
        let holding = apply(&mut portfolio, &buy);

        let sell = plan_trade(
            TransactionType::Sell,
            5,
            dec!(120),
            &portfolio,
            holding.as_ref(),
        )
        .unwrap();
        let holding = apply(&mut portfolio, &sell).unwrap();

        assert_eq!(portfolio.virtual_cash, dec!(99600));
        assert_eq!(holding.quantity, 5);
        assert_eq!(holding.invested_amount, dec!(500));
        assert_eq!(holding.average_price, dec!(100));
        assert_eq!(portfolio.total_invested, dec!(500));
    }

    #[test]
    fn second_buy_uses_weighted_average() {
        let mut portfolio = portfolio_with_cash(dec!(100000));
        let first = plan_trade(TransactionType::Buy, 10, dec!(100), &portfolio, None).unwrap();
        let holding = apply(&mut portfolio, &first);
        let second = plan_trade(
            TransactionType::Buy,
            30,
            dec!(120),
            &portfolio,
            holding.as_ref(),
        )
        .unwrap();
        let h = second.holding_after.unwrap();
        assert_eq!(h.quantity, 40);
        assert_eq!(h.invested_amount, dec!(4600));
        assert_eq!(h.average_price, dec!(115));
    }

    #[test]
    fn buy_with_exact_cash_succeeds() {
        let portfolio = portfolio_with_cash(dec!(1000));
        let plan = plan_trade(TransactionType::Buy, 10, dec!(100), &portfolio, None).unwrap();
        assert_eq!(plan.cash_after, Decimal::ZERO);
    }

    #[test]
    fn buy_rejected_on_insufficient_funds() {
        let portfolio = portfolio_with_cash(dec!(999.99));
        let err = plan_trade(TransactionType::Buy, 10, dec!(100), &portfolio, None).unwrap_err();
        match err {
            PaisaError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, dec!(1000));
                assert_eq!(available, dec!(999.99));
            }
            other => panic!("expected InsufficientFunds, got {other}"),
        }
    }

    #[test]
    fn sell_without_holding_rejected() {
        let portfolio = portfolio_with_cash(dec!(1000));
        let err = plan_trade(TransactionType::Sell, 1, dec!(10), &portfolio, None).unwrap_err();
        assert!(matches!(
            err,
            PaisaError::InsufficientShares {
                requested: 1,
                available: 0
            }
        ));
    }

    #[test]
    fn sell_more_than_held_rejected() {
        let mut portfolio = portfolio_with_cash(dec!(100000));
        let buy = plan_trade(TransactionType::Buy, 3, dec!(10), &portfolio, None).unwrap();
        let holding = apply(&mut portfolio, &buy);
        let err = plan_trade(TransactionType::Sell, 4, dec!(10), &portfolio, holding.as_ref())
            .unwrap_err();
        assert!(matches!(
            err,
            PaisaError::InsufficientShares {
                requested: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn selling_everything_closes_position() {
        let mut portfolio = portfolio_with_cash(dec!(100000));
        let buy = plan_trade(TransactionType::Buy, 3, dec!(33.33), &portfolio, None).unwrap();
        let holding = apply(&mut portfolio, &buy);
        let sell = plan_trade(TransactionType::Sell, 3, dec!(40), &portfolio, holding.as_ref())
            .unwrap();
        assert!(sell.holding_after.is_none());
        assert_eq!(sell.total_invested_after, Decimal::ZERO);
        assert_eq!(sell.cash_after, dec!(100000) - dec!(99.99) + dec!(120));
    }

    #[test]
    fn zero_or_negative_quantity_rejected() {
        let portfolio = portfolio_with_cash(dec!(1000));
        for qty in [0, -5] {
            assert!(matches!(
                plan_trade(TransactionType::Buy, qty, dec!(1), &portfolio, None),
                Err(PaisaError::InvalidQuantity)
            ));
        }
    }

    #[test]
    fn messages_name_the_symbol() {
        assert_eq!(
            trade_message(TransactionType::Buy, 10, "TCS"),
            "Successfully bought 10 shares of TCS"
        );
        assert_eq!(
            trade_message(TransactionType::Sell, 2, "INFY"),
            "Successfully sold 2 shares of INFY"
        );
    }

    proptest! {
        #[test]
        fn fills_conserve_cash_and_shares(
            ops in proptest::collection::vec((any::<bool>(), 1i64..50, 1i64..100_000), 0..60)
        ) {
            let initial = dec!(100000);
            let mut portfolio = portfolio_with_cash(initial);
            let mut holding: Option<Holding> = None;
            let mut spent = Decimal::ZERO;
            let mut received = Decimal::ZERO;
            let mut bought = 0i64;
            let mut sold = 0i64;

            for (is_buy, quantity, cents) in ops {
                let price = Decimal::new(cents, 2);
                let cost = Decimal::from(quantity) * price;
                let held = holding.as_ref().map(|h| h.quantity).unwrap_or(0);
                let cash_before = portfolio.virtual_cash;
                let kind = if is_buy { TransactionType::Buy } else { TransactionType::Sell };

                match plan_trade(kind, quantity, price, &portfolio, holding.as_ref()) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.total_amount, cost);
                        if is_buy {
                            prop_assert_eq!(plan.cash_after, cash_before - cost);
                            let after = plan.holding_after.map(|h| h.quantity);
                            prop_assert_eq!(after, Some(held + quantity));
                            spent += cost;
                            bought += quantity;
                        } else {
                            prop_assert_eq!(plan.cash_after, cash_before + cost);
                            let after = plan.holding_after.map(|h| h.quantity).unwrap_or(0);
                            prop_assert_eq!(after, held - quantity);
                            prop_assert_eq!(plan.holding_after.is_none(), held == quantity);
                            received += cost;
                            sold += quantity;
                        }
                        prop_assert!(plan.total_invested_after >= Decimal::ZERO);
                        holding = apply(&mut portfolio, &plan);
                    }
                    Err(PaisaError::InsufficientFunds { .. }) => {
                        prop_assert!(is_buy && cash_before < cost);
                    }
                    Err(PaisaError::InsufficientShares { requested, available }) => {
                        prop_assert!(!is_buy && held < quantity);
                        prop_assert_eq!((requested, available), (quantity, held));
                    }
                    Err(other) => prop_assert!(false, "unexpected error {}", other),
                }
            }

            prop_assert_eq!(portfolio.virtual_cash, initial - spent + received);
            prop_assert!(portfolio.virtual_cash >= Decimal::ZERO);
            let held = holding.as_ref().map(|h| h.quantity).unwrap_or(0);
            prop_assert_eq!(held, bought - sold);
            if held == 0 {
                prop_assert_eq!(portfolio.total_invested, Decimal::ZERO);
            }
        }

        #[test]
        fn average_price_is_weighted_over_buy_fills(
            fills in proptest::collection::vec((1i64..50, 1i64..100_000), 1..30)
        ) {
            let mut portfolio = portfolio_with_cash(dec!(10000000000));
            let mut holding: Option<Holding> = None;
            let mut cost = Decimal::ZERO;
            let mut shares = 0i64;

            for (quantity, cents) in fills {
                let price = Decimal::new(cents, 2);
                let plan = plan_trade(TransactionType::Buy, quantity, price, &portfolio, holding.as_ref())
                    .unwrap();
                cost += Decimal::from(quantity) * price;
                shares += quantity;
                holding = apply(&mut portfolio, &plan);

                let h = holding.as_ref().unwrap();
                prop_assert_eq!(h.quantity, shares);
                prop_assert_eq!(h.invested_amount, cost);
                prop_assert_eq!(h.average_price, cost / Decimal::from(shares));
                prop_assert_eq!(portfolio.total_invested, cost);
            }
        }
    }
}

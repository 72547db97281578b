//! Port traits the adapters implement.
//!
//! Every operation on user-owned data takes an explicit
//! [`UserContext`](crate::domain::user::UserContext).

pub mod config_port;
pub mod user_port;
pub mod ledger_port;
pub mod token_port;
pub mod budget_port;
pub mod goal_port;
pub mod progress_port;
pub mod content_port;

use budget_port::BudgetPort;
use content_port::ContentPort;
use goal_port::GoalPort;
use ledger_port::LedgerPort;
use progress_port::ProgressPort;
use token_port::TokenPort;
use user_port::UserPort;

/// Everything the web layer needs from persistence.
pub trait Store:
    UserPort + LedgerPort + TokenPort + BudgetPort + GoalPort + ProgressPort + ContentPort + Send + Sync
{
}

impl<T> Store for T where
    T: UserPort
        + LedgerPort
        + TokenPort
        + BudgetPort
        + GoalPort
        + ProgressPort
        + ContentPort
        + Send
        + Sync
{
}

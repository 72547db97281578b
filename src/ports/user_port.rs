//! Accounts, profiles and the gamification read models.

use chrono::NaiveDate;

use crate::domain::error::PaisaError;
use crate::domain::user::{
    Dashboard, Leaderboard, NewUser, ProfileUpdate, SiteStats, User, UserContext, UserProfile,
    UserStats,
};

pub trait UserPort {
    /// Create the user, their profile and their portfolio together.
    fn register(&self, new_user: &NewUser, password: &str) -> Result<User, PaisaError>;

    /// `Ok(None)` for an unknown username or a wrong password.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, PaisaError>;

    fn get_user(&self, user_id: i64) -> Result<Option<User>, PaisaError>;

    fn update_profile(&self, user: &UserContext, update: &ProfileUpdate)
    -> Result<User, PaisaError>;

    fn profile(&self, user: &UserContext) -> Result<UserProfile, PaisaError>;

    fn leaderboard(&self, user: &UserContext, limit: usize) -> Result<Leaderboard, PaisaError>;

    fn user_stats(&self, user: &UserContext) -> Result<UserStats, PaisaError>;

    fn dashboard(&self, user: &UserContext, today: NaiveDate) -> Result<Dashboard, PaisaError>;

    fn site_stats(&self) -> Result<SiteStats, PaisaError>;
}

//! Authentication backend for axum-login.
//!
//! Users live in the store; the session remembers the user id and is
//! invalidated whenever the stored password hash changes.

use axum_login::{AuthUser, AuthnBackend, UserId};
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::error::PaisaError;
use crate::domain::user::{User, UserContext};
use crate::ports::Store;

/// The authenticated principal kept in the session.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pw_hash_bytes: Vec<u8>,
}

impl SessionUser {
    pub fn context(&self) -> UserContext {
        UserContext::new(self.id, self.username.clone())
    }
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            pw_hash_bytes: user.password_hash.into_bytes(),
        }
    }
}

impl AuthUser for SessionUser {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        &self.pw_hash_bytes
    }
}

/// Login credentials submitted via the login form.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn Store>,
}

impl Backend {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

impl AuthnBackend for Backend {
    type User = SessionUser;
    type Credentials = Credentials;
    type Error = PaisaError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        Ok(self
            .store
            .authenticate(creds.username.trim(), &creds.password)?
            .map(SessionUser::from))
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.store.get_user(*user_id)?.map(SessionUser::from))
    }
}

pub type AuthSession = axum_login::AuthSession<Backend>;

//! Registration, sessions, profile and the gamification overview.

use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use super::{current_user, parse_decimal, parse_optional_int, today};
use crate::adapters::web::AppState;
use crate::adapters::web::auth::{AuthSession, Backend, Credentials, SessionUser};
use crate::adapters::web::error::WebError;
use crate::domain::error::PaisaError;
use crate::domain::user::{Dashboard, FinancialExperience, Leaderboard, NewUser, ProfileUpdate, UserStats};

pub const LEADERBOARD_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub monthly_income: Option<String>,
    #[serde(default)]
    pub financial_experience: Option<String>,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub monthly_income: Option<String>,
    #[serde(default)]
    pub financial_experience: Option<String>,
}

fn income(raw: Option<&str>) -> Result<Decimal, PaisaError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_decimal("monthly_income", s),
        None => Ok(Decimal::ZERO),
    }
}

fn experience(raw: Option<&str>) -> Result<FinancialExperience, PaisaError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => FinancialExperience::from_str(s),
        None => Ok(FinancialExperience::default()),
    }
}

impl RegisterForm {
    /// Splits the form into the user record and the confirmed password.
    pub fn into_new_user(self) -> Result<(NewUser, String), PaisaError> {
        if self.password1 != self.password2 {
            return Err(PaisaError::validation("password2", "the two passwords do not match"));
        }
        let new_user = NewUser {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            age: parse_optional_int("age", self.age.as_deref())?,
            occupation: self.occupation,
            monthly_income: income(self.monthly_income.as_deref())?,
            financial_experience: experience(self.financial_experience.as_deref())?,
        };
        Ok((new_user, self.password1))
    }
}

impl TryFrom<ProfileForm> for ProfileUpdate {
    type Error = PaisaError;

    fn try_from(form: ProfileForm) -> Result<Self, Self::Error> {
        Ok(ProfileUpdate {
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email.trim().to_string(),
            phone_number: form.phone_number,
            age: parse_optional_int("age", form.age.as_deref())?,
            occupation: form.occupation,
            monthly_income: income(form.monthly_income.as_deref())?,
            financial_experience: experience(form.financial_experience.as_deref())?,
        })
    }
}

fn session_error(err: axum_login::Error<Backend>) -> WebError {
    match err {
        axum_login::Error::Backend(e) => WebError::from(e),
        axum_login::Error::Session(e) => {
            eprintln!("Session error: {e}");
            WebError::internal("internal server error")
        }
    }
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<serde_json::Value>, WebError> {
    let stats = state.store.site_stats()?;
    Ok(Json(json!({
        "stats": stats,
        "username": auth.user.as_ref().map(|u| u.username.clone()),
    })))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    mut auth: AuthSession,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let (new_user, password) = form.into_new_user()?;
    let user = state.store.register(&new_user, &password)?;
    auth.login(&SessionUser::from(user.clone()))
        .await
        .map_err(session_error)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub async fn login(
    mut auth: AuthSession,
    Form(creds): Form<Credentials>,
) -> Result<Response, WebError> {
    let user = match auth.authenticate(creds).await.map_err(session_error)? {
        Some(user) => user,
        None => return Err(WebError::unauthorized("Invalid username or password")),
    };
    auth.login(&user).await.map_err(session_error)?;
    Ok(Json(json!({ "success": true, "username": user.username })).into_response())
}

pub async fn logout(mut auth: AuthSession) -> Result<Json<serde_json::Value>, WebError> {
    auth.logout().await.map_err(session_error)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Dashboard>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.dashboard(&user, today())?))
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<serde_json::Value>, WebError> {
    let user = current_user(&auth)?;
    let record = state
        .store
        .get_user(user.user_id)?
        .ok_or_else(|| PaisaError::not_found("user", user.user_id))?;
    let profile = state.store.profile(&user)?;
    Ok(Json(json!({ "user": record, "profile": profile })))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Form(form): Form<ProfileForm>,
) -> Result<Json<serde_json::Value>, WebError> {
    let user = current_user(&auth)?;
    let update = ProfileUpdate::try_from(form)?;
    let record = state.store.update_profile(&user, &update)?;
    Ok(Json(json!({ "success": true, "user": record })))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<Leaderboard>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.leaderboard(&user, LEADERBOARD_SIZE)?))
}

pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<Json<UserStats>, WebError> {
    let user = current_user(&auth)?;
    Ok(Json(state.store.user_stats(&user)?))
}

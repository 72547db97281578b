//! HTTP handlers, grouped by area.
//!
//! Store calls are synchronous; each handler builds a [`UserContext`] from
//! the session and hands it to the store explicitly.

pub mod account;
pub mod budget;
pub mod goals;
pub mod learn;
pub mod portfolio;
pub mod rewards;

use axum::http::Uri;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::auth::AuthSession;
use super::error::WebError;
use crate::domain::error::PaisaError;
use crate::domain::user::UserContext;

pub async fn not_found(uri: Uri) -> WebError {
    WebError::not_found(format!("no route for {}", uri.path()))
}

pub(super) fn current_user(auth: &AuthSession) -> Result<UserContext, WebError> {
    auth.user
        .as_ref()
        .map(|user| user.context())
        .ok_or_else(|| WebError::unauthorized("authentication required"))
}

pub(super) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(super) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, PaisaError> {
    Decimal::from_str(raw.trim())
        .map_err(|_| PaisaError::validation(field, format!("'{raw}' is not a number")))
}

pub(super) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, PaisaError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PaisaError::validation(field, format!("'{raw}' is not a YYYY-MM-DD date")))
}

/// Empty form fields count as absent.
pub(super) fn parse_optional_int(field: &str, raw: Option<&str>) -> Result<Option<i64>, PaisaError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| PaisaError::validation(field, format!("'{s}' is not a whole number"))),
    }
}

/// HTML checkboxes submit "on" when ticked and nothing otherwise.
pub(super) fn checkbox(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}

/// Lenient query parameter parsing; garbage falls back to the default.
pub(super) fn query_number<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_form_values() {
        assert_eq!(parse_decimal("amount", " 12.50 ").unwrap(), dec!(12.50));
        assert!(parse_decimal("amount", "twelve").is_err());
        assert_eq!(
            parse_date("date", "2024-03-09").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
        assert!(parse_date("date", "09/03/2024").is_err());
    }

    #[test]
    fn optional_ints_treat_blank_as_absent() {
        assert_eq!(parse_optional_int("age", None).unwrap(), None);
        assert_eq!(parse_optional_int("age", Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_int("age", Some("21")).unwrap(), Some(21));
        assert!(parse_optional_int("age", Some("old")).is_err());
    }

    #[test]
    fn checkbox_values() {
        assert!(checkbox(Some("on")));
        assert!(!checkbox(Some("off")));
        assert!(!checkbox(None));
        assert_eq!(query_number::<usize>(Some("3")), Some(3));
        assert_eq!(query_number::<usize>(Some("x")), None);
    }
}

//! Core domain types and logic.
//!
//! Nothing in here touches the database or the network; the adapters feed
//! records in and persist what comes out.

pub mod error;
pub mod settings;
pub mod money;
pub mod user;
pub mod stock;
pub mod portfolio;
pub mod execution;
pub mod tokens;
pub mod budget;
pub mod analysis;
pub mod goals;
pub mod progress;
pub mod content;

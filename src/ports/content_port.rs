//! Bulk loading of reference content.

use crate::domain::content::{ContentBundle, ContentSummary};
use crate::domain::error::PaisaError;

pub trait ContentPort {
    /// Insert every item in the bundle in one transaction.
    fn load_content(&self, bundle: &ContentBundle) -> Result<ContentSummary, PaisaError>;
}

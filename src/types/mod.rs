mod category;
mod models;

pub use category::{Category, Visibility};
pub use models::*;

use uuid::Uuid;

/// New entity id. UUIDv7, so ids sort by creation time.
#[must_use]
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Rejects malformed ids before they reach the store.
pub fn require_id(id: &str, what: &str) -> crate::error::Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(crate::error::Error::InvalidInput(format!("invalid {what} id")))
    }
}

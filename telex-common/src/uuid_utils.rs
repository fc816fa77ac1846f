//! Request identifier utilities

use uuid::Uuid;

/// Generate a fresh request identifier (UUIDv4)
pub fn new_request_id() -> Uuid {
    Uuid::new_v4()
}

//! Identifier and timestamp helpers shared by the domains.

use uuid::Uuid;

/// `<prefix>-` followed by the first 8 hex chars of a v4 UUID.
pub fn generate_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &uuid[..8])
}

/// Current time as Unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

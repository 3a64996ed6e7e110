mod entry;
mod models;
mod role;

pub use entry::ListEntry;
pub use models::*;
pub use role::{Role, can_manage_members, can_manage_roles};

/// Canonical form of an email address: trimmed and lowercased. Used for the
/// unique index on users and for invitation matching.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
        assert_eq!(normalize_email("alice@example.com"), "alice@example.com");
    }
}

use crate::db::Database;
use crate::error::Result;
use crate::types::{NotificationCounts, normalize_email};

/// Pending-invitation counts for badge display. Recomputed per call; the
/// clients poll this.
pub fn notification_counts(db: &dyn Database, email: &str) -> Result<NotificationCounts> {
    let email_norm = normalize_email(email);
    Ok(NotificationCounts {
        household_invitations: db.count_pending_household_invitations(&email_norm)?,
        store_invitations: db.count_pending_store_invitations(&email_norm)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::core::invites::{
        accept_household_invitation, create_household_invitation, create_store_invitation,
    };
    use crate::db::SqliteDatabase;
    use crate::types::*;

    use super::*;

    #[test]
    fn test_counts_follow_invitation_lifecycle() {
        let temp = TempDir::new().unwrap();
        let db = SqliteDatabase::new(temp.path().join("test.db")).unwrap();
        db.initialize().unwrap();

        let now = Utc::now();
        for id in ["alice", "bob"] {
            db.create_user(&User {
                id: id.to_string(),
                email: format!("{id}@example.com"),
                email_norm: format!("{id}@example.com"),
                name: id.to_string(),
                password_hash: "x".to_string(),
                scopes: Vec::new(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        }
        db.create_household(
            &Household {
                id: "hh-1".to_string(),
                name: "home".to_string(),
                created_by: "alice".to_string(),
                updated_by: "alice".to_string(),
                created_at: now,
                updated_at: now,
            },
            &HouseholdMember {
                household_id: "hh-1".to_string(),
                user_id: "alice".to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();
        db.create_store(
            &Store {
                id: "store-1".to_string(),
                name: "corner shop".to_string(),
                household_id: None,
                is_hidden: false,
                created_by: "alice".to_string(),
                updated_by: "alice".to_string(),
                created_at: now,
                updated_at: now,
            },
            &StoreCollaborator {
                store_id: "store-1".to_string(),
                user_id: "alice".to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();

        let counts = notification_counts(&db, "bob@example.com").unwrap();
        assert_eq!(counts.household_invitations, 0);
        assert_eq!(counts.store_invitations, 0);

        let hh_invite =
            create_household_invitation(&db, "hh-1", "Bob@Example.com", Role::Editor, "alice")
                .unwrap();
        create_store_invitation(&db, "store-1", "bob@example.com", Role::Editor, "alice").unwrap();

        // Matching is case-insensitive on the caller's email too.
        let counts = notification_counts(&db, "BOB@example.com").unwrap();
        assert_eq!(counts.household_invitations, 1);
        assert_eq!(counts.store_invitations, 1);

        accept_household_invitation(&db, &hh_invite.token, "bob", "bob@example.com").unwrap();
        let counts = notification_counts(&db, "bob@example.com").unwrap();
        assert_eq!(counts.household_invitations, 0);
        assert_eq!(counts.store_invitations, 1);
    }
}

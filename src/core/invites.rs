use chrono::Utc;
use rand::RngCore;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::*;

use super::access::{require_household_role, require_store_role};

const INVITATION_TOKEN_BYTES: usize = 16;

/// Generates an invitation token: 32 hex chars (128 bits) from the OS
/// CSPRNG. The token is the capability; it never appears in logs.
fn generate_token() -> String {
    let mut bytes = [0u8; INVITATION_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let mut s = String::with_capacity(INVITATION_TOKEN_BYTES * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    if trimmed.is_empty() || trimmed.len() > 254 || !trimmed.contains('@') {
        return Err(Error::validation("invalid email address"));
    }
    Ok(())
}

// Household invitations

/// Creates a household invitation. The inviter needs the membership
/// management threshold (editor or above).
pub fn create_household_invitation(
    db: &dyn Database,
    household_id: &str,
    email: &str,
    role: Role,
    inviter_id: &str,
) -> Result<HouseholdInvitation> {
    require_household_role(db, inviter_id, household_id, Role::Editor)?;
    validate_email(email)?;
    let email_norm = normalize_email(email);

    if let Some(user) = db.get_user_by_email(&email_norm)? {
        if db.get_household_member(household_id, &user.id)?.is_some() {
            return Err(Error::conflict("email already belongs to a member"));
        }
    }

    let now = Utc::now();
    let invitation = HouseholdInvitation {
        id: Uuid::new_v4().to_string(),
        household_id: household_id.to_string(),
        invited_email: email.trim().to_string(),
        email_norm,
        invited_by: inviter_id.to_string(),
        role,
        token: generate_token(),
        created_at: now,
    };

    match db.create_household_invitation(&invitation) {
        Ok(()) => Ok(invitation),
        Err(Error::AlreadyExists) => Err(Error::conflict(
            "an invitation is already pending for this email",
        )),
        Err(e) => Err(e),
    }
}

/// Accepts a household invitation by token. The authenticated email must
/// match the invited email; membership insert and invitation delete happen
/// atomically.
pub fn accept_household_invitation(
    db: &dyn Database,
    token: &str,
    user_id: &str,
    user_email: &str,
) -> Result<HouseholdMember> {
    let invitation = db
        .get_household_invitation_by_token(token)?
        .ok_or(Error::NotFound)?;

    if invitation.email_norm != normalize_email(user_email) {
        return Err(Error::forbidden(
            "invitation was issued to a different email",
        ));
    }

    if db
        .get_household_member(&invitation.household_id, user_id)?
        .is_some()
    {
        return Err(Error::conflict("already a member of this household"));
    }

    let member = HouseholdMember {
        household_id: invitation.household_id.clone(),
        user_id: user_id.to_string(),
        role: invitation.role,
        created_at: Utc::now(),
    };

    match db.consume_household_invitation(&invitation.id, &member) {
        Ok(()) => Ok(member),
        // Lost a race against another accept from the same account.
        Err(Error::AlreadyExists) => Err(Error::conflict("already a member of this household")),
        Err(e) => Err(e),
    }
}

/// Declines a household invitation by token, deleting it. Same email-match
/// rule as accept.
pub fn decline_household_invitation(db: &dyn Database, token: &str, user_email: &str) -> Result<()> {
    let invitation = db
        .get_household_invitation_by_token(token)?
        .ok_or(Error::NotFound)?;

    if invitation.email_norm != normalize_email(user_email) {
        return Err(Error::forbidden(
            "invitation was issued to a different email",
        ));
    }

    db.delete_household_invitation(&invitation.id)?;
    Ok(())
}

/// Retracts a pending invitation. Allowed for the original inviter and for
/// household owners.
pub fn retract_household_invitation(
    db: &dyn Database,
    invitation_id: &str,
    acting_user_id: &str,
) -> Result<()> {
    let invitation = db
        .get_household_invitation(invitation_id)?
        .ok_or(Error::NotFound)?;

    if invitation.invited_by != acting_user_id {
        // Not the inviter: needs owner on the household. require_* keeps
        // the 404-for-outsiders discipline.
        require_household_role(db, acting_user_id, &invitation.household_id, Role::Owner)?;
    }

    db.delete_household_invitation(&invitation.id)?;
    Ok(())
}

pub fn list_pending_household_invitations_for_user(
    db: &dyn Database,
    email: &str,
) -> Result<Vec<HouseholdInvitation>> {
    db.list_household_invitations_for_email(&normalize_email(email))
}

/// Lists a household's pending invitations; any member may look.
pub fn list_household_invitations(
    db: &dyn Database,
    household_id: &str,
    acting_user_id: &str,
) -> Result<Vec<HouseholdInvitation>> {
    require_household_role(db, acting_user_id, household_id, Role::Viewer)?;
    db.list_household_invitations(household_id)
}

// Store invitations

/// Creates a store invitation. Any collaborator (effective editor or
/// above) may invite; the granted role must be a valid store role.
pub fn create_store_invitation(
    db: &dyn Database,
    store_id: &str,
    email: &str,
    role: Role,
    inviter_id: &str,
) -> Result<StoreInvitation> {
    require_store_role(db, inviter_id, store_id, Role::Editor)?;
    validate_email(email)?;
    if !role.valid_for_store() {
        return Err(Error::validation("stores have no viewer role"));
    }
    let email_norm = normalize_email(email);

    if let Some(user) = db.get_user_by_email(&email_norm)? {
        if db.get_store_collaborator(store_id, &user.id)?.is_some() {
            return Err(Error::conflict("email already belongs to a collaborator"));
        }
    }

    let now = Utc::now();
    let invitation = StoreInvitation {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        invited_email: email.trim().to_string(),
        email_norm,
        invited_by: inviter_id.to_string(),
        role,
        token: generate_token(),
        created_at: now,
    };

    match db.create_store_invitation(&invitation) {
        Ok(()) => Ok(invitation),
        Err(Error::AlreadyExists) => Err(Error::conflict(
            "an invitation is already pending for this email",
        )),
        Err(e) => Err(e),
    }
}

pub fn accept_store_invitation(
    db: &dyn Database,
    token: &str,
    user_id: &str,
    user_email: &str,
) -> Result<StoreCollaborator> {
    let invitation = db
        .get_store_invitation_by_token(token)?
        .ok_or(Error::NotFound)?;

    if invitation.email_norm != normalize_email(user_email) {
        return Err(Error::forbidden(
            "invitation was issued to a different email",
        ));
    }

    if db
        .get_store_collaborator(&invitation.store_id, user_id)?
        .is_some()
    {
        return Err(Error::conflict("already a collaborator on this store"));
    }

    let collaborator = StoreCollaborator {
        store_id: invitation.store_id.clone(),
        user_id: user_id.to_string(),
        role: invitation.role,
        created_at: Utc::now(),
    };

    match db.consume_store_invitation(&invitation.id, &collaborator) {
        Ok(()) => Ok(collaborator),
        Err(Error::AlreadyExists) => Err(Error::conflict("already a collaborator on this store")),
        Err(e) => Err(e),
    }
}

pub fn decline_store_invitation(db: &dyn Database, token: &str, user_email: &str) -> Result<()> {
    let invitation = db
        .get_store_invitation_by_token(token)?
        .ok_or(Error::NotFound)?;

    if invitation.email_norm != normalize_email(user_email) {
        return Err(Error::forbidden(
            "invitation was issued to a different email",
        ));
    }

    db.delete_store_invitation(&invitation.id)?;
    Ok(())
}

pub fn retract_store_invitation(
    db: &dyn Database,
    invitation_id: &str,
    acting_user_id: &str,
) -> Result<()> {
    let invitation = db
        .get_store_invitation(invitation_id)?
        .ok_or(Error::NotFound)?;

    if invitation.invited_by != acting_user_id {
        require_store_role(db, acting_user_id, &invitation.store_id, Role::Owner)?;
    }

    db.delete_store_invitation(&invitation.id)?;
    Ok(())
}

pub fn list_pending_store_invitations_for_user(
    db: &dyn Database,
    email: &str,
) -> Result<Vec<StoreInvitation>> {
    db.list_store_invitations_for_email(&normalize_email(email))
}

pub fn list_store_invitations(
    db: &dyn Database,
    store_id: &str,
    acting_user_id: &str,
) -> Result<Vec<StoreInvitation>> {
    require_store_role(db, acting_user_id, store_id, Role::Viewer)?;
    db.list_store_invitations(store_id)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::db::SqliteDatabase;

    use super::*;

    fn setup() -> (TempDir, SqliteDatabase) {
        let temp = TempDir::new().unwrap();
        let db = SqliteDatabase::new(temp.path().join("test.db")).unwrap();
        db.initialize().unwrap();
        (temp, db)
    }

    fn user(db: &SqliteDatabase, id: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: id.to_string(),
            email: email.to_string(),
            email_norm: normalize_email(email),
            name: id.to_string(),
            password_hash: "x".to_string(),
            scopes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user).unwrap();
        user
    }

    fn household(db: &SqliteDatabase, id: &str, owner_id: &str) {
        let now = Utc::now();
        db.create_household(
            &Household {
                id: id.to_string(),
                name: id.to_string(),
                created_by: owner_id.to_string(),
                updated_by: owner_id.to_string(),
                created_at: now,
                updated_at: now,
            },
            &HouseholdMember {
                household_id: id.to_string(),
                user_id: owner_id.to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();
    }

    fn store(db: &SqliteDatabase, id: &str, owner_id: &str) {
        let now = Utc::now();
        db.create_store(
            &Store {
                id: id.to_string(),
                name: id.to_string(),
                household_id: None,
                is_hidden: false,
                created_by: owner_id.to_string(),
                updated_by: owner_id.to_string(),
                created_at: now,
                updated_at: now,
            },
            &StoreCollaborator {
                store_id: id.to_string(),
                user_id: owner_id.to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_token_is_long_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_invitation_round_trip() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        let bob = user(&db, "bob", "bob@example.com");
        household(&db, "hh-1", "alice");

        let invitation =
            create_household_invitation(&db, "hh-1", "Bob@Example.com", Role::Editor, "alice")
                .unwrap();

        let member =
            accept_household_invitation(&db, &invitation.token, &bob.id, "bob@example.com")
                .unwrap();
        assert_eq!(member.role, Role::Editor);

        // Token is consumed; a second accept is NOT_FOUND.
        assert!(matches!(
            accept_household_invitation(&db, &invitation.token, &bob.id, "bob@example.com"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_accept_with_wrong_email_leaves_invitation_intact() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        let eve = user(&db, "eve", "eve@example.com");
        household(&db, "hh-1", "alice");

        let invitation =
            create_household_invitation(&db, "hh-1", "bob@example.com", Role::Editor, "alice")
                .unwrap();

        assert!(matches!(
            accept_household_invitation(&db, &invitation.token, &eve.id, "eve@example.com"),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            decline_household_invitation(&db, &invitation.token, "eve@example.com"),
            Err(Error::Forbidden(_))
        ));

        assert!(
            db.get_household_invitation(&invitation.id)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_duplicate_pending_invitation_is_conflict() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        household(&db, "hh-1", "alice");

        create_household_invitation(&db, "hh-1", "bob@example.com", Role::Editor, "alice").unwrap();
        assert!(matches!(
            create_household_invitation(&db, "hh-1", "BOB@example.com", Role::Viewer, "alice"),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_inviting_existing_member_is_conflict() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        household(&db, "hh-1", "alice");

        assert!(matches!(
            create_household_invitation(&db, "hh-1", "alice@example.com", Role::Editor, "alice"),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_viewer_cannot_invite() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        let bob = user(&db, "bob", "bob@example.com");
        household(&db, "hh-1", "alice");

        let invitation =
            create_household_invitation(&db, "hh-1", "bob@example.com", Role::Viewer, "alice")
                .unwrap();
        accept_household_invitation(&db, &invitation.token, &bob.id, "bob@example.com").unwrap();

        assert!(matches!(
            create_household_invitation(&db, "hh-1", "carol@example.com", Role::Viewer, "bob"),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_retract_by_inviter_and_owner_only() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        let bob = user(&db, "bob", "bob@example.com");
        user(&db, "mallory", "mallory@example.com");
        household(&db, "hh-1", "alice");

        let bob_invite =
            create_household_invitation(&db, "hh-1", "bob@example.com", Role::Editor, "alice")
                .unwrap();
        accept_household_invitation(&db, &bob_invite.token, &bob.id, "bob@example.com").unwrap();

        let invitation =
            create_household_invitation(&db, "hh-1", "carol@example.com", Role::Viewer, "bob")
                .unwrap();

        // An outsider gets NOT_FOUND, not FORBIDDEN.
        assert!(matches!(
            retract_household_invitation(&db, &invitation.id, "mallory"),
            Err(Error::NotFound)
        ));

        // The inviter (an editor, not an owner) may retract their own.
        retract_household_invitation(&db, &invitation.id, "bob").unwrap();

        let invitation =
            create_household_invitation(&db, "hh-1", "carol@example.com", Role::Viewer, "bob")
                .unwrap();
        // The household owner may retract anyone's.
        retract_household_invitation(&db, &invitation.id, "alice").unwrap();
    }

    #[test]
    fn test_store_invitation_rejects_viewer_role() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        store(&db, "store-1", "alice");

        assert!(matches!(
            create_store_invitation(&db, "store-1", "bob@example.com", Role::Viewer, "alice"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_store_invitation_round_trip() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        let bob = user(&db, "bob", "bob@example.com");
        store(&db, "store-1", "alice");

        let invitation =
            create_store_invitation(&db, "store-1", "bob@example.com", Role::Editor, "alice")
                .unwrap();

        let pending = list_pending_store_invitations_for_user(&db, "BOB@example.com").unwrap();
        assert_eq!(pending.len(), 1);

        let collaborator =
            accept_store_invitation(&db, &invitation.token, &bob.id, "bob@example.com").unwrap();
        assert_eq!(collaborator.role, Role::Editor);

        assert!(
            list_pending_store_invitations_for_user(&db, "bob@example.com")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_invalid_email_rejected() {
        let (_temp, db) = setup();
        user(&db, "alice", "alice@example.com");
        household(&db, "hh-1", "alice");

        assert!(matches!(
            create_household_invitation(&db, "hh-1", "", Role::Editor, "alice"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            create_household_invitation(&db, "hh-1", "not-an-email", Role::Editor, "alice"),
            Err(Error::Validation(_))
        ));
    }
}

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::Role;

use super::access::{require_household_role, require_store_role};

/// Changes a household member's role. Owner-only; changing your own role is
/// rejected outright (there is no self-service transfer path). The
/// last-owner check runs inside the database transaction.
pub fn set_household_role(
    db: &dyn Database,
    household_id: &str,
    target_user_id: &str,
    new_role: Role,
    acting_user_id: &str,
) -> Result<()> {
    require_household_role(db, acting_user_id, household_id, Role::Owner)?;
    if acting_user_id == target_user_id {
        return Err(Error::forbidden("cannot change your own role"));
    }
    db.set_household_member_role(household_id, target_user_id, new_role)
}

/// Removes a member from a household. Owner-only; self-removal goes through
/// [`leave_household`] instead.
pub fn remove_household_member(
    db: &dyn Database,
    household_id: &str,
    target_user_id: &str,
    acting_user_id: &str,
) -> Result<()> {
    require_household_role(db, acting_user_id, household_id, Role::Owner)?;
    if acting_user_id == target_user_id {
        return Err(Error::forbidden("cannot remove yourself; leave instead"));
    }
    db.remove_household_member(household_id, target_user_id)
}

/// Leaves a household. The last owner cannot leave; they must hand off
/// ownership or delete the household.
pub fn leave_household(db: &dyn Database, household_id: &str, user_id: &str) -> Result<()> {
    require_household_role(db, user_id, household_id, Role::Viewer)?;
    db.remove_household_member(household_id, user_id)
}

/// Store-side analogue of [`set_household_role`]. The acting role is the
/// effective one, so a household owner can manage a household-owned store's
/// collaborators without a direct row. The new role must be a valid store
/// role.
pub fn set_store_role(
    db: &dyn Database,
    store_id: &str,
    target_user_id: &str,
    new_role: Role,
    acting_user_id: &str,
) -> Result<()> {
    require_store_role(db, acting_user_id, store_id, Role::Owner)?;
    if acting_user_id == target_user_id {
        return Err(Error::forbidden("cannot change your own role"));
    }
    if !new_role.valid_for_store() {
        return Err(Error::validation("stores have no viewer role"));
    }
    db.set_store_collaborator_role(store_id, target_user_id, new_role)
}

pub fn remove_store_collaborator(
    db: &dyn Database,
    store_id: &str,
    target_user_id: &str,
    acting_user_id: &str,
) -> Result<()> {
    require_store_role(db, acting_user_id, store_id, Role::Owner)?;
    if acting_user_id == target_user_id {
        return Err(Error::forbidden("cannot remove yourself; leave instead"));
    }
    db.remove_store_collaborator(store_id, target_user_id)
}

/// Leaves a store. Only direct collaborators have anything to leave;
/// inherited household access is not a collaborator row.
pub fn leave_store(db: &dyn Database, store_id: &str, user_id: &str) -> Result<()> {
    if db.get_store_collaborator(store_id, user_id)?.is_none() {
        return Err(Error::NotFound);
    }
    db.remove_store_collaborator(store_id, user_id)
}

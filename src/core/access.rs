use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Household, Role, Store};

/// Returns the role a user holds in a household, or None when they are not
/// a member.
pub fn household_role(
    db: &dyn Database,
    user_id: &str,
    household_id: &str,
) -> Result<Option<Role>> {
    Ok(db
        .get_household_member(household_id, user_id)?
        .map(|m| m.role))
}

/// Returns the effective role a user holds on a store: the higher of the
/// direct collaborator role and the role inherited from the owning
/// household. A direct store owner who is also a household viewer is
/// treated as owner; a household viewer with no collaborator row still gets
/// read access.
pub fn store_role(db: &dyn Database, user_id: &str, store_id: &str) -> Result<Option<Role>> {
    let Some(store) = db.get_store(store_id)? else {
        return Ok(None);
    };
    effective_store_role(db, user_id, &store)
}

fn effective_store_role(db: &dyn Database, user_id: &str, store: &Store) -> Result<Option<Role>> {
    let direct = db
        .get_store_collaborator(&store.id, user_id)?
        .map(|c| c.role);
    let inherited = match &store.household_id {
        Some(household_id) => household_role(db, user_id, household_id)?,
        None => None,
    };
    Ok(Role::max_of(direct, inherited))
}

/// True when the user can reach the store at all (any effective role).
pub fn has_access_to_store(db: &dyn Database, user_id: &str, store_id: &str) -> Result<bool> {
    Ok(store_role(db, user_id, store_id)?.is_some())
}

/// Loads the household and the actor's role, requiring at least `required`.
///
/// A missing household and a missing relationship both surface as
/// NOT_FOUND so existence is not confirmed to outsiders; FORBIDDEN is
/// reserved for actors who can see the household but lack the role.
pub fn require_household_role(
    db: &dyn Database,
    user_id: &str,
    household_id: &str,
    required: Role,
) -> Result<(Household, Role)> {
    let household = db.get_household(household_id)?.ok_or(Error::NotFound)?;
    let role = household_role(db, user_id, household_id)?.ok_or(Error::NotFound)?;
    if role < required {
        return Err(Error::forbidden("insufficient household role"));
    }
    Ok((household, role))
}

/// Store-side counterpart of [`require_household_role`], evaluating the
/// effective (direct ⊕ inherited) role.
pub fn require_store_role(
    db: &dyn Database,
    user_id: &str,
    store_id: &str,
    required: Role,
) -> Result<(Store, Role)> {
    let store = db.get_store(store_id)?.ok_or(Error::NotFound)?;
    let role = effective_store_role(db, user_id, &store)?.ok_or(Error::NotFound)?;
    if role < required {
        return Err(Error::forbidden("insufficient store role"));
    }
    Ok((store, role))
}

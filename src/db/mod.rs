mod schema;
mod sqlite;

pub use sqlite::SqliteDatabase;

use crate::error::Result;
use crate::types::*;

/// Database defines the persistence interface.
///
/// Methods that combine a check with a mutation (role changes, member
/// removal, invitation consumption, list-entry insertion, reorder batches)
/// run as a single transaction so concurrent requests cannot interleave
/// between the check and the write.
pub trait Database: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email_norm: &str) -> Result<Option<User>>;
    fn update_user(&self, user: &User) -> Result<()>;

    // Session token operations
    fn create_session_token(&self, token: &SessionToken) -> Result<()>;
    fn get_session_token_by_lookup(&self, lookup: &str) -> Result<Option<SessionToken>>;
    fn delete_session_token(&self, id: &str) -> Result<bool>;
    fn update_session_token_last_used(&self, id: &str) -> Result<()>;

    // Household operations
    fn create_household(&self, household: &Household, owner: &HouseholdMember) -> Result<()>;
    fn get_household(&self, id: &str) -> Result<Option<Household>>;
    fn list_households_for_user(&self, user_id: &str) -> Result<Vec<Household>>;
    fn update_household(&self, household: &Household) -> Result<()>;
    fn delete_household(&self, id: &str) -> Result<bool>;

    // Household member operations
    fn get_household_member(
        &self,
        household_id: &str,
        user_id: &str,
    ) -> Result<Option<HouseholdMember>>;
    fn list_household_members(&self, household_id: &str) -> Result<Vec<HouseholdMember>>;
    fn count_household_owners(&self, household_id: &str) -> Result<i64>;
    /// Fails CONFLICT when the change would demote the last owner.
    fn set_household_member_role(
        &self,
        household_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<()>;
    /// Fails CONFLICT when the target is the last owner.
    fn remove_household_member(&self, household_id: &str, user_id: &str) -> Result<()>;

    // Household invitation operations
    fn create_household_invitation(&self, invitation: &HouseholdInvitation) -> Result<()>;
    fn get_household_invitation(&self, id: &str) -> Result<Option<HouseholdInvitation>>;
    fn get_household_invitation_by_token(&self, token: &str)
    -> Result<Option<HouseholdInvitation>>;
    fn list_household_invitations(&self, household_id: &str) -> Result<Vec<HouseholdInvitation>>;
    fn list_household_invitations_for_email(
        &self,
        email_norm: &str,
    ) -> Result<Vec<HouseholdInvitation>>;
    fn delete_household_invitation(&self, id: &str) -> Result<bool>;
    /// Inserts the membership row and deletes the invitation atomically.
    fn consume_household_invitation(
        &self,
        invitation_id: &str,
        member: &HouseholdMember,
    ) -> Result<()>;
    fn count_household_invitations_for_email(&self, email_norm: &str) -> Result<i64>;

    // Store operations
    fn create_store(&self, store: &Store, owner: &StoreCollaborator) -> Result<()>;
    fn get_store(&self, id: &str) -> Result<Option<Store>>;
    fn list_stores_for_user(&self, user_id: &str) -> Result<Vec<Store>>;
    fn update_store(&self, store: &Store) -> Result<()>;
    fn delete_store(&self, id: &str) -> Result<bool>;

    // Store collaborator operations
    fn get_store_collaborator(
        &self,
        store_id: &str,
        user_id: &str,
    ) -> Result<Option<StoreCollaborator>>;
    fn list_store_collaborators(&self, store_id: &str) -> Result<Vec<StoreCollaborator>>;
    fn count_store_owners(&self, store_id: &str) -> Result<i64>;
    fn set_store_collaborator_role(&self, store_id: &str, user_id: &str, role: Role)
    -> Result<()>;
    fn remove_store_collaborator(&self, store_id: &str, user_id: &str) -> Result<()>;

    // Store invitation operations
    fn create_store_invitation(&self, invitation: &StoreInvitation) -> Result<()>;
    fn get_store_invitation(&self, id: &str) -> Result<Option<StoreInvitation>>;
    fn get_store_invitation_by_token(&self, token: &str) -> Result<Option<StoreInvitation>>;
    fn list_store_invitations(&self, store_id: &str) -> Result<Vec<StoreInvitation>>;
    fn list_store_invitations_for_email(&self, email_norm: &str) -> Result<Vec<StoreInvitation>>;
    fn delete_store_invitation(&self, id: &str) -> Result<bool>;
    fn consume_store_invitation(
        &self,
        invitation_id: &str,
        collaborator: &StoreCollaborator,
    ) -> Result<()>;
    fn count_store_invitations_for_email(&self, email_norm: &str) -> Result<i64>;

    // Aisle operations
    fn create_aisle(&self, aisle: &StoreAisle) -> Result<()>;
    fn get_aisle(&self, id: &str) -> Result<Option<StoreAisle>>;
    fn list_aisles(&self, store_id: &str) -> Result<Vec<StoreAisle>>;
    fn update_aisle(&self, aisle: &StoreAisle) -> Result<()>;
    fn delete_aisle(&self, id: &str) -> Result<bool>;
    fn next_aisle_sort_order(&self, store_id: &str) -> Result<i64>;
    /// Applies the batch atomically; fails NOT_FOUND if any id does not
    /// belong to the store, with no partial application.
    fn reorder_aisles(&self, store_id: &str, updates: &[(String, i64)]) -> Result<()>;

    // Section operations
    fn create_section(&self, section: &StoreSection) -> Result<()>;
    fn get_section(&self, id: &str) -> Result<Option<StoreSection>>;
    fn list_sections(&self, aisle_id: &str) -> Result<Vec<StoreSection>>;
    fn update_section(&self, section: &StoreSection) -> Result<()>;
    fn delete_section(&self, id: &str) -> Result<bool>;
    fn next_section_sort_order(&self, aisle_id: &str) -> Result<i64>;
    fn reorder_sections(&self, store_id: &str, updates: &[(String, i64)]) -> Result<()>;

    // Catalog item operations
    fn create_item(&self, item: &StoreItem) -> Result<()>;
    fn get_item(&self, id: &str) -> Result<Option<StoreItem>>;
    fn get_item_by_norm(&self, store_id: &str, name_norm: &str) -> Result<Option<StoreItem>>;
    /// `query_norm` must already be normalized and LIKE-escaped.
    fn search_items(&self, store_id: &str, query_norm: &str, limit: i64)
    -> Result<Vec<StoreItem>>;
    fn update_item(&self, item: &StoreItem) -> Result<()>;
    fn delete_item(&self, id: &str) -> Result<bool>;

    // Shopping list operations
    /// Inserts the row and, for catalog-linked rows, bumps the item's
    /// usage_count/last_used_at in the same transaction. Fails
    /// `AlreadyExists` when an unchecked row for the same catalog item is
    /// already on the list.
    fn insert_list_item(&self, row: &ShoppingListItem) -> Result<()>;
    fn get_list_item(&self, id: &str) -> Result<Option<ShoppingListItem>>;
    fn get_active_list_item_for_catalog(
        &self,
        store_id: &str,
        store_item_id: &str,
    ) -> Result<Option<ShoppingListItem>>;
    fn list_list_items(&self, store_id: &str) -> Result<Vec<ShoppingListItem>>;
    fn update_list_item(&self, row: &ShoppingListItem) -> Result<()>;
    fn delete_list_item(&self, id: &str) -> Result<bool>;
    /// Transition-aware check toggle: timestamps move only when the flag
    /// actually changes. Returns the row as stored afterwards.
    fn set_list_item_checked(
        &self,
        id: &str,
        checked: bool,
        checked_by: &str,
    ) -> Result<ShoppingListItem>;
    fn clear_checked_list_items(&self, store_id: &str) -> Result<usize>;

    // Quantity unit operations
    fn get_unit(&self, id: &str) -> Result<Option<QuantityUnit>>;
    fn list_units(&self) -> Result<Vec<QuantityUnit>>;

    // Recipe operations
    fn create_recipe(&self, recipe: &Recipe, ingredients: &[RecipeIngredient]) -> Result<()>;
    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>>;
    fn list_recipes(&self, household_id: &str) -> Result<Vec<Recipe>>;
    fn update_recipe(
        &self,
        recipe: &Recipe,
        ingredients: Option<&[RecipeIngredient]>,
    ) -> Result<()>;
    fn delete_recipe(&self, id: &str) -> Result<bool>;
    fn list_recipe_ingredients(&self, recipe_id: &str) -> Result<Vec<RecipeIngredient>>;

    // Notification counts
    fn count_pending_household_invitations(&self, email_norm: &str) -> Result<i64>;
    fn count_pending_store_invitations(&self, email_norm: &str) -> Result<i64>;

    fn close(&self) -> Result<()>;
}

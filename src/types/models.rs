use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Lowercased, trimmed form used for uniqueness and invitation matching.
    #[serde(skip)]
    pub email_norm: String,
    pub name: String,
    #[serde(skip)]
    pub password_hash: String,
    /// Flat scope list, e.g. "admin". Space-separated in storage.
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub household_id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdInvitation {
    pub id: String,
    pub household_id: String,
    pub invited_email: String,
    #[serde(skip)]
    pub email_norm: String,
    pub invited_by: String,
    pub role: Role,
    #[serde(skip)]
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    /// Owning household, or None for a private store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_id: Option<String>,
    pub is_hidden: bool,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCollaborator {
    pub store_id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInvitation {
    pub id: String,
    pub store_id: String,
    pub invited_email: String,
    #[serde(skip)]
    pub email_norm: String,
    pub invited_by: String,
    pub role: Role,
    #[serde(skip)]
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreAisle {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub id: String,
    pub store_id: String,
    pub aisle_id: String,
    pub name: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreItem {
    pub id: String,
    pub store_id: String,
    pub name: String,
    /// Case-folded, whitespace-collapsed form; unique per store.
    pub name_norm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aisle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    pub usage_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityUnit {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
}

/// Flattened persistence row for a shopping-list entry. Business logic works
/// with the `ListEntry` union instead; only the database edge sees this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub id: String,
    pub store_id: String,
    /// Null only when `is_idea` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_item_id: Option<String>,
    /// Free-text name; present only when `is_idea` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idea_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub is_idea: bool,
    pub is_checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_by: Option<String>,
    pub is_unsure: bool,
    /// Marks rows seeded as example data.
    pub is_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub household_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: String,
    pub recipe_id: String,
    /// Ingredient name; resolved against a store catalog when the recipe is
    /// pushed onto a shopping list.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    pub sort_order: i64,
}

/// Pending-invitation counts for badge display, keyed by the caller's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationCounts {
    pub household_invitations: i64,
    pub store_invitations: i64,
}
